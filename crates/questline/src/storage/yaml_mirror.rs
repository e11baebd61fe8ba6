use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::progress::{PlayerData, PlayerId};

use super::atomic_io::{remove_if_present, write_text_atomic};
use super::error::StorageError;
use super::ProgressStore;

pub(crate) const MIRROR_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct MirrorDocument<P> {
    format_version: u32,
    player: P,
}

/// Flat-file copy of every player, one YAML document per player.
#[derive(Debug, Clone)]
pub struct YamlMirror {
    dir: PathBuf,
}

impl YamlMirror {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: PlayerId) -> PathBuf {
        self.dir.join(format!("{id}.yml"))
    }
}

impl ProgressStore for YamlMirror {
    fn name(&self) -> &'static str {
        "yaml_mirror"
    }

    fn load(&self, id: PlayerId) -> Result<Option<PlayerData>, StorageError> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })?;
        let document: MirrorDocument<PlayerData> =
            serde_yaml::from_str(&raw).map_err(|source| StorageError::Yaml {
                path: path.clone(),
                source,
            })?;
        if document.format_version > MIRROR_FORMAT_VERSION {
            return Err(StorageError::MirrorFormat {
                path,
                found: document.format_version,
            });
        }
        if document.player.id() != id {
            return Err(StorageError::InvalidRow {
                player: id.to_string(),
                message: format!("mirror file holds player {}", document.player.id()),
            });
        }
        Ok(Some(document.player))
    }

    fn save(&self, data: &PlayerData) -> Result<(), StorageError> {
        let path = self.path_for(data.id());
        let document = MirrorDocument {
            format_version: MIRROR_FORMAT_VERSION,
            player: data,
        };
        let text = serde_yaml::to_string(&document).map_err(|source| StorageError::Yaml {
            path: path.clone(),
            source,
        })?;
        write_text_atomic(&path, &text).map_err(|source| StorageError::Io { path, source })
    }

    fn delete(&self, id: PlayerId) -> Result<bool, StorageError> {
        let path = self.path_for(id);
        remove_if_present(&path).map_err(|source| StorageError::Io { path, source })
    }
}
