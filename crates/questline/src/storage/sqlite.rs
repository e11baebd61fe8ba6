use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, warn};

use crate::progress::{PlayerData, PlayerId, QuestProgress, QuestSlot, StepData, QUEST_COUNT};

use super::error::StorageError;
use super::ProgressStore;

pub(crate) const SCHEMA_VERSION: i64 = 1;

static CONNECTION_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

const CREATE_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS players (
    uuid          TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    started       INTEGER NOT NULL DEFAULT 0,
    current_quest INTEGER NOT NULL DEFAULT 0,
    completed     INTEGER NOT NULL DEFAULT 0,
    coins_granted INTEGER NOT NULL DEFAULT 0,
    coins_spent   INTEGER NOT NULL DEFAULT 0,
    created_at    INTEGER NOT NULL,
    updated_at    INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS quest_progress (
    uuid         TEXT NOT NULL REFERENCES players(uuid) ON DELETE CASCADE,
    quest        INTEGER NOT NULL CHECK (quest BETWEEN 1 AND 6),
    started      INTEGER NOT NULL DEFAULT 0,
    completed    INTEGER NOT NULL DEFAULT 0,
    step         INTEGER NOT NULL DEFAULT 0,
    started_at   INTEGER NOT NULL DEFAULT 0,
    completed_at INTEGER NOT NULL DEFAULT 0,
    data         TEXT NOT NULL DEFAULT '{}',
    PRIMARY KEY (uuid, quest)
);
"#;

const UPSERT_PLAYER_SQL: &str = r#"
INSERT INTO players (uuid, name, started, current_quest, completed,
                     coins_granted, coins_spent, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
ON CONFLICT(uuid) DO UPDATE SET
    name = excluded.name,
    started = excluded.started,
    current_quest = excluded.current_quest,
    completed = excluded.completed,
    coins_granted = excluded.coins_granted,
    coins_spent = excluded.coins_spent,
    updated_at = excluded.updated_at
"#;

const UPSERT_QUEST_SQL: &str = r#"
INSERT INTO quest_progress (uuid, quest, started, completed, step,
                            started_at, completed_at, data)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
ON CONFLICT(uuid, quest) DO UPDATE SET
    started = excluded.started,
    completed = excluded.completed,
    step = excluded.step,
    started_at = excluded.started_at,
    completed_at = excluded.completed_at,
    data = excluded.data
"#;

/// Relational store: one `players` row plus six `quest_progress` rows per
/// player.
pub struct SqliteStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path).map_err(StorageError::sqlite("open"))?;
        Self::with_connection(path.to_path_buf(), conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(StorageError::sqlite("open"))?;
        Self::with_connection(PathBuf::from(":memory:"), conn)
    }

    fn with_connection(path: PathBuf, conn: Connection) -> Result<Self, StorageError> {
        conn.pragma_update(None, "foreign_keys", true)
            .map_err(StorageError::sqlite("enable foreign keys"))?;
        let journal_mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(StorageError::sqlite("set journal mode"))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(StorageError::sqlite("set synchronous"))?;
        migrate(&conn, &path)?;
        info!(
            path = %path.display(),
            schema_version = SCHEMA_VERSION,
            journal_mode = %journal_mode,
            "sqlite_store_opened"
        );
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                if CONNECTION_LOCK_POISON_WARNED
                    .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    warn!("sqlite connection lock poisoned; recovered inner value");
                }
                poisoned.into_inner()
            }
        }
    }
}

fn migrate(conn: &Connection, path: &Path) -> Result<(), StorageError> {
    let found: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(StorageError::sqlite("read schema version"))?;
    if found > SCHEMA_VERSION {
        return Err(StorageError::SchemaVersion {
            path: path.to_path_buf(),
            found,
            supported: SCHEMA_VERSION,
        });
    }
    if found < SCHEMA_VERSION {
        conn.execute_batch(CREATE_SCHEMA_SQL)
            .map_err(StorageError::sqlite("create schema"))?;
        conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))
            .map_err(StorageError::sqlite("write schema version"))?;
        info!(from = found, to = SCHEMA_VERSION, "sqlite_schema_migrated");
    }
    Ok(())
}

struct PlayerRow {
    name: String,
    started: bool,
    current_quest: i64,
    completed: bool,
    coins_granted: i64,
    coins_spent: i64,
    created_at: i64,
    updated_at: i64,
}

impl ProgressStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn load(&self, id: PlayerId) -> Result<Option<PlayerData>, StorageError> {
        let conn = self.lock();
        let key = id.to_string();
        let row = conn
            .query_row(
                "SELECT name, started, current_quest, completed, coins_granted, coins_spent, \
                 created_at, updated_at FROM players WHERE uuid = ?1",
                params![key],
                |row| {
                    Ok(PlayerRow {
                        name: row.get(0)?,
                        started: row.get(1)?,
                        current_quest: row.get(2)?,
                        completed: row.get(3)?,
                        coins_granted: row.get(4)?,
                        coins_spent: row.get(5)?,
                        created_at: row.get(6)?,
                        updated_at: row.get(7)?,
                    })
                },
            )
            .optional()
            .map_err(StorageError::sqlite("load player"))?;
        let Some(row) = row else {
            return Ok(None);
        };

        let current_quest = u8::try_from(row.current_quest)
            .ok()
            .filter(|value| usize::from(*value) <= QUEST_COUNT)
            .ok_or_else(|| StorageError::InvalidRow {
                player: key.clone(),
                message: format!("current_quest {} outside 0..={QUEST_COUNT}", row.current_quest),
            })?;

        let mut data = PlayerData::new(id, row.name, row.created_at);
        data.started = row.started;
        data.current_quest = current_quest;
        data.completed = row.completed;
        data.coins_granted = row.coins_granted;
        data.coins_spent = row.coins_spent;
        data.updated_at = row.updated_at;

        let mut stmt = conn
            .prepare_cached(
                "SELECT quest, started, completed, step, started_at, completed_at, data \
                 FROM quest_progress WHERE uuid = ?1 ORDER BY quest",
            )
            .map_err(StorageError::sqlite("prepare quest load"))?;
        let rows = stmt
            .query_map(params![key], |row| {
                let quest: i64 = row.get(0)?;
                let blob: String = row.get(6)?;
                let progress = QuestProgress {
                    started: row.get(1)?,
                    completed: row.get(2)?,
                    step: row.get(3)?,
                    started_at: row.get(4)?,
                    completed_at: row.get(5)?,
                    data: StepData::decode_blob(&blob),
                };
                Ok((quest, progress))
            })
            .map_err(StorageError::sqlite("load quests"))?;
        for row in rows {
            let (quest, progress) = row.map_err(StorageError::sqlite("read quest row"))?;
            match u8::try_from(quest).ok().and_then(QuestSlot::new) {
                Some(slot) => *data.quest_mut(slot) = progress,
                None => warn!(player = %id, quest, "sqlite_quest_row_out_of_range"),
            }
        }
        Ok(Some(data))
    }

    fn save(&self, data: &PlayerData) -> Result<(), StorageError> {
        let key = data.id().to_string();
        let mut blobs = Vec::with_capacity(QUEST_COUNT);
        for (_, progress) in data.quests() {
            let blob =
                progress
                    .data()
                    .encode_blob()
                    .map_err(|source| StorageError::EncodeStepData {
                        player: key.clone(),
                        source,
                    })?;
            blobs.push(blob);
        }

        let mut conn = self.lock();
        let tx = conn
            .transaction()
            .map_err(StorageError::sqlite("begin save"))?;
        tx.execute(
            UPSERT_PLAYER_SQL,
            params![
                key,
                data.name(),
                data.is_started(),
                data.current_quest(),
                data.is_completed(),
                data.coins_granted(),
                data.coins_spent(),
                data.created_at(),
                data.updated_at(),
            ],
        )
        .map_err(StorageError::sqlite("upsert player"))?;
        {
            let mut stmt = tx
                .prepare_cached(UPSERT_QUEST_SQL)
                .map_err(StorageError::sqlite("prepare quest upsert"))?;
            for ((slot, progress), blob) in data.quests().zip(&blobs) {
                stmt.execute(params![
                    key,
                    slot.number(),
                    progress.is_started(),
                    progress.is_completed(),
                    progress.step(),
                    progress.started_at(),
                    progress.completed_at(),
                    blob,
                ])
                .map_err(StorageError::sqlite("upsert quest"))?;
            }
        }
        tx.commit().map_err(StorageError::sqlite("commit save"))
    }

    fn delete(&self, id: PlayerId) -> Result<bool, StorageError> {
        let conn = self.lock();
        let removed = conn
            .execute("DELETE FROM players WHERE uuid = ?1", params![id.to_string()])
            .map_err(StorageError::sqlite("delete player"))?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::progress::StepValue;

    fn slot(number: u8) -> QuestSlot {
        QuestSlot::new(number).expect("slot")
    }

    fn quest_row_count(store: &SqliteStore, id: PlayerId) -> i64 {
        store
            .lock()
            .query_row(
                "SELECT COUNT(*) FROM quest_progress WHERE uuid = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .expect("count")
    }

    fn sample_player() -> PlayerData {
        let mut data = PlayerData::new(PlayerId::new_random(), "Sam", 1_000);
        data.start(1_100);
        data.complete_step(slot(1), "talked_to_guide", 1_200);
        data.quest_mut(slot(1))
            .data_mut()
            .insert("distance", StepValue::Decimal(14.5));
        data.mark_quest_completed(slot(1), 1_300);
        data.advance(1_300);
        data.record_coin_grant(250);
        data.record_coin_spend(40);
        data
    }

    #[test]
    fn save_then_load_reproduces_player() {
        let store = SqliteStore::open_in_memory().expect("store");
        let data = sample_player();
        store.save(&data).expect("save");

        let loaded = store.load(data.id()).expect("load").expect("present");
        assert_eq!(loaded, data);
        assert_eq!(quest_row_count(&store, data.id()), QUEST_COUNT as i64);
    }

    #[test]
    fn saving_twice_upserts_instead_of_duplicating() {
        let store = SqliteStore::open_in_memory().expect("store");
        let mut data = sample_player();
        store.save(&data).expect("first save");
        data.complete_step(slot(2), "found_portal", 2_000);
        store.save(&data).expect("second save");

        let loaded = store.load(data.id()).expect("load").expect("present");
        assert_eq!(loaded.quest(slot(2)).step(), 1);
        assert_eq!(quest_row_count(&store, data.id()), QUEST_COUNT as i64);
    }

    #[test]
    fn missing_player_loads_as_none() {
        let store = SqliteStore::open_in_memory().expect("store");
        assert!(store.load(PlayerId::new_random()).expect("load").is_none());
    }

    #[test]
    fn deleting_player_cascades_to_quest_rows() {
        let store = SqliteStore::open_in_memory().expect("store");
        let data = sample_player();
        store.save(&data).expect("save");

        assert!(store.delete(data.id()).expect("delete"));
        assert_eq!(quest_row_count(&store, data.id()), 0);
        assert!(!store.delete(data.id()).expect("second delete"));
    }

    #[test]
    fn reopening_file_keeps_data_and_schema_version() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("data").join("questline.db");
        let data = sample_player();
        {
            let store = SqliteStore::open(&path).expect("open");
            store.save(&data).expect("save");
        }
        let store = SqliteStore::open(&path).expect("reopen");
        let version: i64 = store
            .lock()
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .expect("version");
        assert_eq!(version, SCHEMA_VERSION);
        assert_eq!(store.load(data.id()).expect("load"), Some(data));
    }

    #[test]
    fn newer_schema_version_is_rejected() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("future.db");
        {
            let conn = Connection::open(&path).expect("conn");
            conn.execute_batch("PRAGMA user_version = 99;")
                .expect("bump version");
        }
        let error = SqliteStore::open(&path).err().expect("error");
        assert!(matches!(
            error,
            StorageError::SchemaVersion { found: 99, .. }
        ));
    }

    #[test]
    fn legacy_blob_rows_load_with_bad_fields_dropped() {
        let store = SqliteStore::open_in_memory().expect("store");
        let data = sample_player();
        store.save(&data).expect("save");
        store
            .lock()
            .execute(
                "UPDATE quest_progress SET data = ?1 WHERE uuid = ?2 AND quest = 2",
                params![r#"{"tokens":4,"bad":null}"#, data.id().to_string()],
            )
            .expect("update");

        let loaded = store.load(data.id()).expect("load").expect("present");
        let quest_two = loaded.quest(slot(2)).data();
        assert_eq!(quest_two.counter("tokens"), 4);
        assert_eq!(quest_two.len(), 1);
    }
}
