mod bootstrap;
mod loop_runner;
mod world;

use questline::{ConfigError, StartupError};
use thiserror::Error;

pub(crate) use bootstrap::build_app;
pub(crate) use loop_runner::run_walkthrough;

#[derive(Debug, Error)]
pub(crate) enum HostError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
