use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod config;
pub mod guide;
pub mod nav;
pub mod progress;
pub mod quest;
pub mod storage;
pub mod zone;

pub use config::{load_config, ConfigError, QuestlineConfig};
pub use guide::{
    GuideAudience, GuideConfig, GuideStep, GuideTickReport, MarkerEmitter, PathGuideManager,
    PathGuideSession,
};
pub use nav::{
    snap_to_walkable, straight_line_route, BlockKind, BlockView, BlockWalkability, GridPathfinder,
    GridPoint, PathfinderConfig, Route, RouteKind, VoxelGrid, WalkabilityOracle,
};
pub use progress::{
    epoch_millis, PlayerData, PlayerId, QuestProgress, QuestSlot, StepData, StepValue, QUEST_COUNT,
};
pub use quest::{
    Collaborators, Economy, QuestCatalog, QuestDefinition, QuestManager, QuestNotice, RewardSink,
    SkillProvider,
};
pub use storage::{PlayerRepository, StorageConfig, StorageError, WriteReport, WriteStatus};
pub use zone::{Zone, ZoneTracker, ZoneTransition};

pub const ROOT_ENV_VAR: &str = "QUESTLINE_ROOT";
pub const CONFIG_ENV_VAR: &str = "QUESTLINE_CONFIG";
pub const CONFIG_FILE_NAME: &str = "questline.yml";

#[derive(Debug, Clone)]
pub struct DataPaths {
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub config_file: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current directory: {0}")]
    CurrentDir(#[source] std::io::Error),
    #[error("{var} is set but is not a directory: {path}")]
    InvalidEnvRoot { var: &'static str, path: PathBuf },
    #[error("failed to create data directory at {path}: {source}")]
    CreateDataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolves the root (env override or current directory), creates `data/`
/// beneath it and picks the config file.
pub fn resolve_data_paths() -> Result<DataPaths, StartupError> {
    let root = resolve_root()?;
    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).map_err(|source| StartupError::CreateDataDir {
        path: data_dir.clone(),
        source,
    })?;

    let config_file = match read_env(CONFIG_ENV_VAR)? {
        Some(value) => root.join(value),
        None => root.join(CONFIG_FILE_NAME),
    };

    Ok(DataPaths {
        root,
        data_dir,
        config_file,
    })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match read_env(ROOT_ENV_VAR)? {
        Some(value) => {
            let normalized = normalize_path(Path::new(&value));
            if normalized.is_dir() {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot {
                    var: ROOT_ENV_VAR,
                    path: normalized,
                })
            }
        }
        None => env::current_dir()
            .map(|dir| normalize_path(&dir))
            .map_err(StartupError::CurrentDir),
    }
}

fn read_env(var: &'static str) -> Result<Option<String>, StartupError> {
    match env::var(var) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(source) => Err(StartupError::EnvVar { var, source }),
    }
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_keeps_missing_paths_as_given() {
        let cwd = env::current_dir().expect("cwd");
        let missing = cwd.join("definitely_not_a_data_root");
        assert_eq!(normalize_path(&missing), missing);
    }
}
