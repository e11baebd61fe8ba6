mod manager;
mod session;

pub use manager::{GuideAudience, GuideConfig, GuideTickReport, MarkerEmitter, PathGuideManager};
pub use session::{GuideStep, PathGuideSession};
