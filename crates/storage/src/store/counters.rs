#![forbid(unsafe_code)]

use super::{CounterStore, SqliteStore, StoreError, now_ms};
use qaf_core::{CounterKey, StoredVersion};
use rusqlite::types::ValueRef;
use rusqlite::{OptionalExtension, TransactionBehavior, params};

/// Snapshot of one `form_counters` row.
#[derive(Clone, Debug, PartialEq)]
pub struct CounterRecord {
    pub key: String,
    pub seq: u64,
    pub version: Option<StoredVersion>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl CounterStore for SqliteStore {
    fn increment_sequence(&mut self, key: &CounterKey) -> Result<u64, StoreError> {
        let now_ms = now_ms();
        // IMMEDIATE takes the write lock up front so contention waits in the
        // busy handler instead of failing on a stale read snapshot.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let seq = tx
            .query_row(
                r#"
                INSERT INTO form_counters(key, seq, version, created_at_ms, updated_at_ms)
                VALUES (?1, 1, NULL, ?2, ?2)
                ON CONFLICT(key) DO UPDATE
                  SET seq = form_counters.seq + 1, updated_at_ms = excluded.updated_at_ms
                  WHERE form_counters.seq < 9223372036854775807
                RETURNING seq
                "#,
                params![key.as_str(), now_ms],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        let Some(seq) = seq else {
            return Err(StoreError::SequenceExhausted {
                key: key.as_str().to_string(),
            });
        };
        tx.commit()?;
        u64::try_from(seq).map_err(|_| StoreError::SequenceExhausted {
            key: key.as_str().to_string(),
        })
    }

    fn read_version(&self, key: &CounterKey) -> Result<Option<StoredVersion>, StoreError> {
        let stored = self
            .conn
            .query_row(
                "SELECT version FROM form_counters WHERE key=?1",
                params![key.as_str()],
                |row| Ok(stored_version(row.get_ref(0)?)),
            )
            .optional()?;
        Ok(stored.flatten())
    }

    fn set_version(&mut self, key: &CounterKey, raw: &str) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE form_counters SET version=?2, updated_at_ms=?3 WHERE key=?1",
            params![key.as_str(), raw, now_ms()],
        )?;
        if changed == 0 {
            return Err(StoreError::UnknownKey {
                key: key.as_str().to_string(),
            });
        }
        Ok(())
    }
}

impl SqliteStore {
    pub fn counter(&self, key: &CounterKey) -> Result<Option<CounterRecord>, StoreError> {
        let record = self
            .conn
            .query_row(
                "SELECT key, seq, version, created_at_ms, updated_at_ms \
                 FROM form_counters WHERE key=?1",
                params![key.as_str()],
                |row| {
                    Ok(CounterRecord {
                        key: row.get::<_, String>(0)?,
                        seq: row.get::<_, i64>(1)?.max(0) as u64,
                        version: stored_version(row.get_ref(2)?),
                        created_at_ms: row.get::<_, i64>(3)?,
                        updated_at_ms: row.get::<_, i64>(4)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub fn list_counters(&self) -> Result<Vec<CounterRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT key, seq, version, created_at_ms, updated_at_ms \
             FROM form_counters ORDER BY key ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(CounterRecord {
                key: row.get::<_, String>(0)?,
                seq: row.get::<_, i64>(1)?.max(0) as u64,
                version: stored_version(row.get_ref(2)?),
                created_at_ms: row.get::<_, i64>(3)?,
                updated_at_ms: row.get::<_, i64>(4)?,
            });
        }
        Ok(out)
    }
}

fn stored_version(value: ValueRef<'_>) -> Option<StoredVersion> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(value) => Some(StoredVersion::Integer(value)),
        ValueRef::Real(value) => Some(StoredVersion::Real(value)),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Some(StoredVersion::Text(
            String::from_utf8_lossy(bytes).into_owned(),
        )),
    }
}
