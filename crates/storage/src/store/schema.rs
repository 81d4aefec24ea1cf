#![forbid(unsafe_code)]

use super::{StoreError, now_ms};
use rusqlite::{Connection, params};
use std::collections::BTreeSet;

pub(super) const SCHEMA_VERSION: i64 = 1;

const SQL: &str = r#"
        CREATE TABLE IF NOT EXISTS store_state (
          singleton INTEGER PRIMARY KEY CHECK(singleton = 1),
          schema_version INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        -- One row per logical form type. `version` is untyped on purpose:
        -- older writers stored JSON-quoted text, others a raw number.
        CREATE TABLE IF NOT EXISTS form_counters (
          key TEXT PRIMARY KEY,
          seq INTEGER NOT NULL DEFAULT 0 CHECK(seq >= 0),
          version,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );
"#;

/// Refuses to touch a database file that holds tables this store does not own.
pub(super) fn preflight_gate(conn: &Connection) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let mut rows = stmt.query([])?;
    let mut tables = BTreeSet::new();
    while let Some(row) = rows.next()? {
        tables.insert(row.get::<_, String>(0)?);
    }

    if tables.is_empty() {
        return Ok(());
    }

    let known: BTreeSet<&str> = ["store_state", "form_counters"].into_iter().collect();
    if tables.iter().any(|table| !known.contains(table.as_str())) {
        return Err(StoreError::ResetRequired("unsupported tables detected"));
    }

    if tables.contains("store_state") {
        let version = schema_version(conn)?;
        if version > SCHEMA_VERSION {
            return Err(StoreError::ResetRequired("store was written by a newer schema"));
        }
    }

    Ok(())
}

pub(super) fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    let now_ms = now_ms();
    conn.execute_batch(SQL)?;
    conn.execute(
        "INSERT INTO store_state(singleton, schema_version, created_at_ms, updated_at_ms) \
         VALUES (1, ?1, ?2, ?2) \
         ON CONFLICT(singleton) DO UPDATE SET schema_version=excluded.schema_version, updated_at_ms=excluded.updated_at_ms \
         WHERE store_state.schema_version <> excluded.schema_version",
        params![SCHEMA_VERSION, now_ms],
    )?;
    Ok(())
}

pub(super) fn schema_version(conn: &Connection) -> Result<i64, StoreError> {
    Ok(conn.query_row(
        "SELECT schema_version FROM store_state WHERE singleton=1",
        [],
        |row| row.get::<_, i64>(0),
    )?)
}
