mod atomic_io;
mod dual;
mod error;
mod repository;
mod saver;
mod sqlite;
mod yaml_mirror;

use crate::progress::{PlayerData, PlayerId};

pub use dual::{DualStore, WriteReport, WriteStatus};
pub use error::StorageError;
pub use repository::{PlayerRepository, StorageConfig};
pub use sqlite::SqliteStore;
pub use yaml_mirror::YamlMirror;

/// A durable home for player progress.
pub trait ProgressStore: Send + Sync {
    fn name(&self) -> &'static str;

    fn load(&self, id: PlayerId) -> Result<Option<PlayerData>, StorageError>;

    fn save(&self, data: &PlayerData) -> Result<(), StorageError>;

    /// Returns whether anything was removed.
    fn delete(&self, id: PlayerId) -> Result<bool, StorageError>;
}
