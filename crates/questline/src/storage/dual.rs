use tracing::warn;

use crate::progress::{PlayerData, PlayerId};

use super::ProgressStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Written,
    Failed,
    /// The store was never opened.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    pub primary: WriteStatus,
    pub mirror: WriteStatus,
}

impl WriteReport {
    pub fn is_fully_written(&self) -> bool {
        self.primary == WriteStatus::Written && self.mirror == WriteStatus::Written
    }
}

/// Authoritative relational store paired with a flat-file mirror.
///
/// Reads go to the primary and only fall back to the mirror when the primary
/// is missing or erroring. Writes go to both independently; a failure in one
/// never prevents the other.
pub struct DualStore {
    primary: Option<Box<dyn ProgressStore>>,
    mirror: Box<dyn ProgressStore>,
}

impl DualStore {
    pub fn new(primary: Option<Box<dyn ProgressStore>>, mirror: Box<dyn ProgressStore>) -> Self {
        Self { primary, mirror }
    }

    pub fn primary_available(&self) -> bool {
        self.primary.is_some()
    }

    pub fn read(&self, id: PlayerId) -> Option<PlayerData> {
        if let Some(primary) = &self.primary {
            match primary.load(id) {
                Ok(found) => return found,
                Err(error) => warn!(
                    player = %id,
                    store = primary.name(),
                    error = %error,
                    "primary_store_read_failed_using_mirror"
                ),
            }
        }
        match self.mirror.load(id) {
            Ok(found) => found,
            Err(error) => {
                warn!(
                    player = %id,
                    store = self.mirror.name(),
                    error = %error,
                    "mirror_store_read_failed"
                );
                None
            }
        }
    }

    pub fn write(&self, data: &PlayerData) -> WriteReport {
        let primary = match &self.primary {
            Some(store) => write_one(store.as_ref(), data),
            None => WriteStatus::Skipped,
        };
        let mirror = write_one(self.mirror.as_ref(), data);
        WriteReport { primary, mirror }
    }

    pub fn delete(&self, id: PlayerId) {
        let stores = self.primary.iter().chain(std::iter::once(&self.mirror));
        for store in stores {
            if let Err(error) = store.delete(id) {
                warn!(player = %id, store = store.name(), error = %error, "store_delete_failed");
            }
        }
    }
}

fn write_one(store: &dyn ProgressStore, data: &PlayerData) -> WriteStatus {
    match store.save(data) {
        Ok(()) => WriteStatus::Written,
        Err(error) => {
            warn!(
                player = %data.id(),
                store = store.name(),
                error = %error,
                "store_write_failed"
            );
            WriteStatus::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use super::*;
    use crate::storage::StorageError;

    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<HashMap<PlayerId, PlayerData>>,
        broken: bool,
    }

    impl MemoryStore {
        fn broken() -> Self {
            Self {
                broken: true,
                ..Self::default()
            }
        }
    }

    fn offline() -> StorageError {
        StorageError::Io {
            path: PathBuf::from("memory"),
            source: io::Error::new(io::ErrorKind::Other, "store offline"),
        }
    }

    impl ProgressStore for MemoryStore {
        fn name(&self) -> &'static str {
            "memory"
        }

        fn load(&self, id: PlayerId) -> Result<Option<PlayerData>, StorageError> {
            if self.broken {
                return Err(offline());
            }
            Ok(self.rows.lock().expect("rows").get(&id).cloned())
        }

        fn save(&self, data: &PlayerData) -> Result<(), StorageError> {
            if self.broken {
                return Err(offline());
            }
            self.rows
                .lock()
                .expect("rows")
                .insert(data.id(), data.clone());
            Ok(())
        }

        fn delete(&self, id: PlayerId) -> Result<bool, StorageError> {
            Ok(self.rows.lock().expect("rows").remove(&id).is_some())
        }
    }

    fn player() -> PlayerData {
        PlayerData::new(PlayerId::new_random(), "Kim", 1)
    }

    #[test]
    fn failing_primary_write_still_writes_mirror() {
        let store = DualStore::new(
            Some(Box::new(MemoryStore::broken())),
            Box::new(MemoryStore::default()),
        );
        let data = player();
        let report = store.write(&data);
        assert_eq!(report.primary, WriteStatus::Failed);
        assert_eq!(report.mirror, WriteStatus::Written);
        assert_eq!(store.read(data.id()), Some(data));
    }

    #[test]
    fn missing_primary_is_skipped() {
        let store = DualStore::new(None, Box::new(MemoryStore::default()));
        let data = player();
        assert_eq!(store.write(&data).primary, WriteStatus::Skipped);
        assert_eq!(store.read(data.id()), Some(data));
    }

    #[test]
    fn healthy_primary_is_authoritative_even_when_row_missing() {
        let mirror = MemoryStore::default();
        let data = player();
        mirror.save(&data).expect("seed mirror");
        let store = DualStore::new(Some(Box::new(MemoryStore::default())), Box::new(mirror));
        assert_eq!(store.read(data.id()), None);
    }
}
