use std::time::Duration;

use questline::{load_config, resolve_data_paths, DataPaths, QuestlineConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::world;
use super::HostError;

const MAX_TICKS_ENV_VAR: &str = "QUESTLINE_MAX_TICKS";
const DEFAULT_MAX_TICKS: u32 = 3_000;

#[derive(Debug, Clone)]
pub(crate) struct LoopConfig {
    pub(crate) tick_interval: Duration,
    pub(crate) max_ticks: u32,
}

pub(crate) struct AppWiring {
    pub(crate) paths: DataPaths,
    pub(crate) config: QuestlineConfig,
    pub(crate) loop_config: LoopConfig,
}

pub(crate) fn build_app() -> Result<AppWiring, HostError> {
    init_tracing();
    info!("=== Questline Host Startup ===");

    let paths = resolve_data_paths()?;
    info!(
        root = %paths.root.display(),
        data_dir = %paths.data_dir.display(),
        config_file = %paths.config_file.display(),
        "startup"
    );

    let mut config = load_config(&paths.config_file)?;
    if config.guide.target_zone.is_none() {
        let zone = world::portal_zone();
        info!(zone = %zone.name, "target_zone_defaulted");
        config.guide.target_zone = Some(zone);
    }

    let loop_config = LoopConfig {
        tick_interval: config.guide.tick_interval(),
        max_ticks: parse_max_ticks(std::env::var(MAX_TICKS_ENV_VAR).ok().as_deref()),
    };

    Ok(AppWiring {
        paths,
        config,
        loop_config,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn parse_max_ticks(raw: Option<&str>) -> u32 {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => match value.parse::<u32>() {
            Ok(ticks) if ticks > 0 => ticks,
            _ => {
                warn!(var = MAX_TICKS_ENV_VAR, value, "invalid_max_ticks_using_default");
                DEFAULT_MAX_TICKS
            }
        },
        None => DEFAULT_MAX_TICKS,
    }
}
