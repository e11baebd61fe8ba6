use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::guide::GuideConfig;
use crate::nav::{PathfinderConfig, MIN_STRAIGHT_LINE_STEP};
use crate::progress::QUEST_COUNT;
use crate::quest::{default_quest_definitions, QuestCatalog, QuestDefinition};
use crate::storage::StorageConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file {path} at {field}: {source}")]
    Parse {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("expected {expected} quest definitions, got {found}")]
    QuestCount { expected: usize, found: usize },
    #[error("quest {quest} must have at least one step")]
    EmptyQuest { quest: u8 },
    #[error("guided quest {found} is outside 1..={max}")]
    GuidedQuest { found: u8, max: usize },
    #[error("straight line step {found} must be at least {min}")]
    StraightLineStep { found: f64, min: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestlineConfig {
    pub storage: StorageConfig,
    pub pathfinding: PathfinderConfig,
    pub guide: GuideConfig,
    pub quests: Vec<QuestDefinition>,
}

impl Default for QuestlineConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            pathfinding: PathfinderConfig::default(),
            guide: GuideConfig::default(),
            quests: default_quest_definitions(),
        }
    }
}

impl QuestlineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        QuestCatalog::new(self.quests.clone())?;
        if !(1..=QUEST_COUNT).contains(&usize::from(self.guide.guided_quest)) {
            return Err(ConfigError::GuidedQuest {
                found: self.guide.guided_quest,
                max: QUEST_COUNT,
            });
        }
        let step = self.guide.straight_line_step;
        if !(step.is_finite() && step >= MIN_STRAIGHT_LINE_STEP) {
            return Err(ConfigError::StraightLineStep {
                found: step,
                min: MIN_STRAIGHT_LINE_STEP,
            });
        }
        Ok(())
    }

    pub fn catalog(&self) -> Result<QuestCatalog, ConfigError> {
        QuestCatalog::new(self.quests.clone())
    }
}

/// Loads and validates the YAML config. A missing file means defaults.
pub fn load_config(path: &Path) -> Result<QuestlineConfig, ConfigError> {
    if !path.exists() {
        info!(path = %path.display(), "config_missing_using_defaults");
        return Ok(QuestlineConfig::default());
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(path, &raw)?;
    config.validate()?;
    info!(path = %path.display(), "config_loaded");
    Ok(config)
}

fn parse_config(path: &Path, raw: &str) -> Result<QuestlineConfig, ConfigError> {
    if raw.trim().is_empty() {
        return Ok(QuestlineConfig::default());
    }
    let deserializer = serde_yaml::Deserializer::from_str(raw);
    serde_path_to_error::deserialize(deserializer).map_err(|error| {
        let field = error.path().to_string();
        ConfigError::Parse {
            path: path.to_path_buf(),
            field,
            source: error.into_inner(),
        }
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write(temp: &TempDir, text: &str) -> PathBuf {
        let path = temp.path().join("questline.yml");
        fs::write(&path, text).expect("write config");
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let temp = TempDir::new().expect("temp");
        let config = load_config(&temp.path().join("absent.yml")).expect("config");
        assert_eq!(config, QuestlineConfig::default());
        assert_eq!(config.pathfinding.max_iterations, 5000);
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let temp = TempDir::new().expect("temp");
        let path = write(
            &temp,
            concat!(
                "pathfinding:\n",
                "  max_iterations: 200\n",
                "guide:\n",
                "  recompute_cooldown_ms: 500\n",
                "  target_zone:\n",
                "    name: portal\n",
                "    min: { x: 1, y: 1, z: 1 }\n",
                "    max: { x: 3, y: 3, z: 3 }\n",
            ),
        );
        let config = load_config(&path).expect("config");
        assert_eq!(config.pathfinding.max_iterations, 200);
        assert_eq!(config.pathfinding.goal_tolerance, 2.0);
        assert_eq!(config.guide.recompute_cooldown_ms, 500);
        assert_eq!(
            config.guide.target_zone.map(|zone| zone.name),
            Some("portal".to_string())
        );
        assert_eq!(config.quests.len(), QUEST_COUNT);
    }

    #[test]
    fn bad_field_reports_its_path() {
        let temp = TempDir::new().expect("temp");
        let path = write(&temp, "pathfinding:\n  max_iterations: lots\n");
        match load_config(&path) {
            Err(ConfigError::Parse { field, .. }) => {
                assert_eq!(field, "pathfinding.max_iterations");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn wrong_quest_count_fails_validation() {
        let temp = TempDir::new().expect("temp");
        let path = write(&temp, "quests:\n  - title: Only one\n    step_count: 1\n");
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::QuestCount { found: 1, .. })
        ));
    }

    #[test]
    fn guided_quest_must_be_a_real_slot() {
        let temp = TempDir::new().expect("temp");
        let path = write(&temp, "guide:\n  guided_quest: 9\n");
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::GuidedQuest { found: 9, .. })
        ));
    }

    #[test]
    fn tiny_straight_line_step_is_rejected() {
        let temp = TempDir::new().expect("temp");
        let path = write(&temp, "guide:\n  straight_line_step: 0.000000001\n");
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::StraightLineStep { .. })
        ));
    }
}
