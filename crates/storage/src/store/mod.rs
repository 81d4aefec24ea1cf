#![forbid(unsafe_code)]

mod counters;
mod error;
mod schema;

pub use counters::CounterRecord;
pub use error::StoreError;

use qaf_core::{CounterKey, StoredVersion};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DB_FILE_NAME: &str = "qaf_counters.db";
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Persisted key -> {sequence, version} mapping.
///
/// `increment_sequence` must be a single atomic update-and-fetch inside the
/// storage engine. Implementations must not read the current value and write
/// back `value + 1` from the application.
pub trait CounterStore {
    fn increment_sequence(&mut self, key: &CounterKey) -> Result<u64, StoreError>;

    fn read_version(&self, key: &CounterKey) -> Result<Option<StoredVersion>, StoreError>;

    fn set_version(&mut self, key: &CounterKey, raw: &str) -> Result<(), StoreError>;
}

/// SQLite-backed counter store. One connection per value; callers that need
/// concurrency open one store per unit of work and let SQLite serialize the
/// writers.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_timeout(storage_dir, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with_timeout(
        storage_dir: impl AsRef<Path>,
        busy_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let conn = Connection::open(storage_dir.join(DB_FILE_NAME))?;
        conn.busy_timeout(busy_timeout)?;

        schema::preflight_gate(&conn)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        schema::install_schema(&conn)?;

        Ok(Self { conn, storage_dir })
    }

    /// Opens a read-write connection to a store whose schema is already
    /// installed. Fails instead of creating a new database file.
    pub fn connect(
        storage_dir: impl AsRef<Path>,
        busy_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        let conn = Connection::open_with_flags(
            storage_dir.join(DB_FILE_NAME),
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
        Ok(Self { conn, storage_dir })
    }

    /// Opens an existing store without installing or migrating the schema.
    pub fn open_read_only(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        let conn = Connection::open_with_flags(
            storage_dir.join(DB_FILE_NAME),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        Ok(Self { conn, storage_dir })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn schema_version(&self) -> Result<i64, StoreError> {
        schema::schema_version(&self.conn)
    }
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration,
        Err(_) => return 0,
    };

    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
