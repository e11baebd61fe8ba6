use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::progress::{epoch_millis, PlayerData, PlayerId};

use super::dual::{DualStore, WriteReport};
use super::saver::BackgroundSaver;
use super::sqlite::SqliteStore;
use super::yaml_mirror::YamlMirror;
use super::ProgressStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file, relative to the data directory.
    pub sqlite_file: String,
    /// Directory for the YAML mirror, relative to the data directory.
    pub mirror_dir: String,
    /// Hand routine saves to a worker thread instead of writing inline.
    pub background_saves: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_file: "questline.db".to_string(),
            mirror_dir: "players".to_string(),
            background_saves: true,
        }
    }
}

/// Write-through cache of player progress in front of the dual store.
///
/// The cache map is safe to touch from any thread; a given player's entry is
/// only mutated from the main loop. Closures passed to [`update`] must not
/// call back into the repository.
///
/// [`update`]: PlayerRepository::update
pub struct PlayerRepository {
    stores: Arc<DualStore>,
    cache: DashMap<PlayerId, PlayerData>,
    saver: Option<BackgroundSaver>,
}

impl PlayerRepository {
    pub fn new(stores: DualStore, background_saves: bool) -> Self {
        let stores = Arc::new(stores);
        let saver = if background_saves {
            match BackgroundSaver::spawn(Arc::clone(&stores)) {
                Ok(saver) => Some(saver),
                Err(error) => {
                    warn!(error = %error, "background_saver_spawn_failed_saving_inline");
                    None
                }
            }
        } else {
            None
        };
        Self {
            stores,
            cache: DashMap::new(),
            saver,
        }
    }

    /// Opens SQLite and the mirror under `data_dir`. A database that cannot be
    /// opened leaves the repository running on the mirror alone.
    pub fn open(data_dir: &Path, config: &StorageConfig) -> Self {
        let sqlite_path = data_dir.join(&config.sqlite_file);
        let primary: Option<Box<dyn ProgressStore>> = match SqliteStore::open(&sqlite_path) {
            Ok(store) => Some(Box::new(store)),
            Err(error) => {
                warn!(
                    path = %sqlite_path.display(),
                    error = %error,
                    "sqlite_unavailable_using_mirror_only"
                );
                None
            }
        };
        let mirror = YamlMirror::new(data_dir.join(&config.mirror_dir));
        info!(
            mirror_dir = %mirror.dir().display(),
            primary = primary.is_some(),
            background_saves = config.background_saves,
            "player_repository_opened"
        );
        Self::new(
            DualStore::new(primary, Box::new(mirror)),
            config.background_saves,
        )
    }

    pub fn primary_available(&self) -> bool {
        self.stores.primary_available()
    }

    /// Snapshot of the player's progress, loading or creating it on a miss.
    pub fn get(&self, id: PlayerId, name: &str) -> PlayerData {
        self.update(id, name, |data| data.clone())
    }

    pub fn cached(&self, id: PlayerId) -> Option<PlayerData> {
        self.cache.get(&id).map(|entry| entry.value().clone())
    }

    pub fn is_cached(&self, id: PlayerId) -> bool {
        self.cache.contains_key(&id)
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Runs `f` against the cached working copy, loading it first if needed.
    /// Does not persist; follow with [`save`](Self::save) or
    /// [`force_save`](Self::force_save).
    pub fn update<R>(&self, id: PlayerId, name: &str, f: impl FnOnce(&mut PlayerData) -> R) -> R {
        let mut entry = self
            .cache
            .entry(id)
            .or_insert_with(|| self.load_or_create(id, name));
        f(entry.value_mut())
    }

    fn load_or_create(&self, id: PlayerId, name: &str) -> PlayerData {
        match self.stores.read(id) {
            Some(mut data) => {
                if !name.is_empty() {
                    data.set_name(name);
                }
                data
            }
            None => {
                info!(player = %id, name, "player_progress_created");
                PlayerData::new(id, name, epoch_millis())
            }
        }
    }

    /// Routine save: queued for the worker thread when one is running.
    /// Returns false if the player is not cached.
    pub fn save(&self, id: PlayerId) -> bool {
        let Some(snapshot) = self.cached(id) else {
            return false;
        };
        match &self.saver {
            Some(saver) => {
                if let Err(snapshot) = saver.submit(snapshot) {
                    warn!(player = %id, "background_saver_unavailable_saving_inline");
                    self.stores.write(&snapshot);
                }
            }
            None => {
                self.stores.write(&snapshot);
            }
        }
        true
    }

    /// Durable save on the calling thread, after any queued saves.
    pub fn force_save(&self, id: PlayerId) -> Option<WriteReport> {
        let snapshot = self.cached(id)?;
        self.wait_for_queued_saves();
        Some(self.stores.write(&snapshot))
    }

    /// Final flush followed by eviction, used on disconnect.
    pub fn unload(&self, id: PlayerId) -> Option<WriteReport> {
        let report = self.force_save(id);
        self.cache.remove(&id);
        report
    }

    /// Writes every cached player synchronously. Returns how many were written.
    pub fn flush_all(&self) -> usize {
        self.wait_for_queued_saves();
        let snapshots: Vec<PlayerData> = self
            .cache
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for snapshot in &snapshots {
            self.stores.write(snapshot);
        }
        snapshots.len()
    }

    /// Removes the player from the cache and from both stores.
    pub fn delete(&self, id: PlayerId) {
        self.wait_for_queued_saves();
        self.cache.remove(&id);
        self.stores.delete(id);
    }

    fn wait_for_queued_saves(&self) {
        if let Some(saver) = &self.saver {
            saver.wait_idle();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::progress::QuestSlot;
    use crate::storage::WriteStatus;

    fn open(temp: &TempDir, background_saves: bool) -> PlayerRepository {
        PlayerRepository::open(
            temp.path(),
            &StorageConfig {
                background_saves,
                ..StorageConfig::default()
            },
        )
    }

    #[test]
    fn miss_creates_fresh_player_in_cache() {
        let temp = TempDir::new().expect("temp");
        let repo = open(&temp, false);
        let id = PlayerId::new_random();

        let data = repo.get(id, "Jo");
        assert_eq!(data.current_quest(), 0);
        assert_eq!(data.name(), "Jo");
        assert!(repo.is_cached(id));
        assert!(repo.primary_available());
    }

    #[test]
    fn unload_then_get_round_trips_through_sqlite() {
        let temp = TempDir::new().expect("temp");
        let repo = open(&temp, true);
        let id = PlayerId::new_random();
        repo.update(id, "Jo", |data| {
            data.start(5);
            data.complete_step(QuestSlot::FIRST, "talked", 6);
        });
        assert!(repo.save(id));
        let before = repo.cached(id).expect("cached");

        let report = repo.unload(id).expect("report");
        assert!(report.is_fully_written());
        assert!(!repo.is_cached(id));
        assert_eq!(repo.get(id, "Jo"), before);
    }

    #[test]
    fn queued_saves_land_before_forced_save() {
        let temp = TempDir::new().expect("temp");
        let repo = open(&temp, true);
        let id = PlayerId::new_random();
        repo.update(id, "Jo", |data| {
            data.start(1);
        });
        repo.save(id);
        repo.update(id, "Jo", |data| {
            data.advance(2);
        });
        repo.force_save(id);
        repo.flush_all();
        drop(repo);

        let reopened = open(&temp, false);
        assert_eq!(reopened.get(id, "Jo").current_quest(), 2);
    }

    #[test]
    fn unusable_database_falls_back_to_mirror() {
        let temp = TempDir::new().expect("temp");
        fs::create_dir_all(temp.path().join("questline.db")).expect("block db path");
        let id = PlayerId::new_random();
        {
            let repo = open(&temp, false);
            assert!(!repo.primary_available());
            repo.update(id, "Jo", |data| {
                data.start(1);
            });
            let report = repo.unload(id).expect("report");
            assert_eq!(report.primary, WriteStatus::Skipped);
            assert_eq!(report.mirror, WriteStatus::Written);
        }
        let repo = open(&temp, false);
        assert_eq!(repo.get(id, "Jo").current_quest(), 1);
    }

    #[test]
    fn delete_removes_player_everywhere() {
        let temp = TempDir::new().expect("temp");
        let repo = open(&temp, false);
        let id = PlayerId::new_random();
        repo.update(id, "Jo", |data| {
            data.start(1);
        });
        repo.force_save(id);
        repo.delete(id);

        assert!(!repo.is_cached(id));
        assert_eq!(repo.get(id, "Jo").current_quest(), 0);
    }

    #[test]
    fn save_of_uncached_player_is_refused() {
        let temp = TempDir::new().expect("temp");
        let repo = open(&temp, false);
        assert!(!repo.save(PlayerId::new_random()));
        assert!(repo.force_save(PlayerId::new_random()).is_none());
    }
}
