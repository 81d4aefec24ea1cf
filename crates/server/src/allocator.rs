#![forbid(unsafe_code)]

use qaf_core::{CodePrefix, CounterKey, FormCode, Version, next_version};
use qaf_storage::{CounterStore, SqliteStore, StoreError};
use std::path::PathBuf;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{error, info, warn};

/// Result of one successful allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    pub form_code: FormCode,
    pub version: Version,
    pub revision_date: OffsetDateTime,
}

/// Only failures of the sequence increment are surfaced. Version read and
/// write problems degrade to defaults inside [`allocate`].
#[derive(Debug, thiserror::Error)]
pub enum AllocateError {
    #[error("counter store unavailable: {0}")]
    StorageUnavailable(#[source] StoreError),
    #[error("counter store timed out: {0}")]
    Timeout(String),
    #[error("allocation worker failed: {0}")]
    Worker(String),
}

impl From<StoreError> for AllocateError {
    fn from(value: StoreError) -> Self {
        if value.is_timeout() {
            Self::Timeout(value.to_string())
        } else {
            Self::StorageUnavailable(value)
        }
    }
}

/// Mints the next form code and version for `key`.
///
/// The increment is the only step that can fail the allocation. Once it has
/// committed the sequence number is consumed, whatever happens afterwards.
pub fn allocate<S>(
    store: &mut S,
    key: &CounterKey,
    prefix: &CodePrefix,
    now: OffsetDateTime,
) -> Result<Allocation, AllocateError>
where
    S: CounterStore + ?Sized,
{
    let seq = store.increment_sequence(key)?;
    let form_code = FormCode::new(prefix, seq);

    let stored = match store.read_version(key) {
        Ok(stored) => stored,
        Err(err) => {
            warn!(key = %key, error = %err, "reading stored version failed; using baseline");
            None
        }
    };
    let (version, recovered) = next_version(stored.as_ref());
    if let Some(err) = recovered {
        warn!(key = %key, raw = err.raw(), "stored version unreadable; reset to baseline");
    }

    // Best effort: a lost write means the next caller recomputes from the old value.
    if let Err(err) = store.set_version(key, &version.to_stored()) {
        warn!(
            key = %key,
            form_code = %form_code,
            version = %version,
            error = %err,
            "persisting version failed"
        );
    }

    info!(key = %key, form_code = %form_code, version = %version, "allocated form code");
    Ok(Allocation {
        form_code,
        version,
        revision_date: now,
    })
}

/// Allocation endpoint state: one counter key and one code prefix over a
/// SQLite store directory.
///
/// Each allocation opens its own connection on a blocking worker, so
/// concurrent requests only meet inside SQLite's write lock.
#[derive(Clone, Debug)]
pub struct AllocatorService {
    storage_dir: PathBuf,
    key: CounterKey,
    prefix: CodePrefix,
    busy_timeout: Duration,
    request_timeout: Duration,
}

impl AllocatorService {
    pub fn new(
        storage_dir: impl Into<PathBuf>,
        key: CounterKey,
        prefix: CodePrefix,
        busy_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            key,
            prefix,
            busy_timeout,
            request_timeout,
        }
    }

    pub fn key(&self) -> &CounterKey {
        &self.key
    }

    pub fn prefix(&self) -> &CodePrefix {
        &self.prefix
    }

    /// Creates the store directory and schema. Called once at startup.
    pub fn install(&self) -> Result<(), StoreError> {
        SqliteStore::open_with_timeout(&self.storage_dir, self.busy_timeout).map(drop)
    }

    /// Checks that the installed store can be opened and read.
    pub fn probe(&self) -> Result<(), StoreError> {
        let store = SqliteStore::open_read_only(&self.storage_dir)?;
        store.schema_version()?;
        Ok(())
    }

    pub fn allocate_blocking(&self) -> Result<Allocation, AllocateError> {
        let mut store = SqliteStore::connect(&self.storage_dir, self.busy_timeout)?;
        allocate(
            &mut store,
            &self.key,
            &self.prefix,
            OffsetDateTime::now_utc(),
        )
    }

    /// Runs one allocation off the async runtime, bounded by the request
    /// timeout. A worker that outlives the timeout still finishes its
    /// increment; that code is simply never handed out.
    pub async fn allocate(&self) -> Result<Allocation, AllocateError> {
        let service = self.clone();
        let work = tokio::task::spawn_blocking(move || service.allocate_blocking());
        match tokio::time::timeout(self.request_timeout, work).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => {
                error!(key = %self.key, error = %join, "allocation worker aborted");
                Err(AllocateError::Worker(join.to_string()))
            }
            Err(_) => Err(AllocateError::Timeout(format!(
                "no answer from the counter store within {} ms",
                self.request_timeout.as_millis()
            ))),
        }
    }
}
