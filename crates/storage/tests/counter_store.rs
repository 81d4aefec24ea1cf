#![forbid(unsafe_code)]

use qaf_core::{CounterKey, StoredVersion};
use qaf_storage::{CounterStore, DB_FILE_NAME, SqliteStore, StoreError};
use rusqlite::{Connection, params};
use std::collections::BTreeSet;
use std::sync::{Arc, Barrier};
use std::time::Duration;

fn key(value: &str) -> CounterKey {
    CounterKey::try_new(value).expect("counter key")
}

#[test]
fn first_increment_creates_the_record() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut store = SqliteStore::open(dir.path()).expect("open store");
    let key = key("SUPPLIER_DUE_DILIGENCE_QUESTIONNAIRE");

    assert!(store.counter(&key).expect("counter").is_none());
    assert_eq!(store.read_version(&key).expect("read version"), None);

    assert_eq!(store.increment_sequence(&key).expect("increment"), 1);
    let record = store.counter(&key).expect("counter").expect("record exists");
    assert_eq!(record.key, "SUPPLIER_DUE_DILIGENCE_QUESTIONNAIRE");
    assert_eq!(record.seq, 1);
    assert_eq!(record.version, None);
    assert!(record.updated_at_ms >= record.created_at_ms);
}

#[test]
fn increments_are_consecutive() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut store = SqliteStore::open(dir.path()).expect("open store");
    let key = key("forms.sequential");

    let seen = (0..25)
        .map(|_| store.increment_sequence(&key).expect("increment"))
        .collect::<Vec<_>>();
    assert_eq!(seen, (1..=25).collect::<Vec<u64>>());
}

#[test]
fn keys_are_independent() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut store = SqliteStore::open(dir.path()).expect("open store");
    let a = key("form-a");
    let b = key("form-b");

    assert_eq!(store.increment_sequence(&a).expect("a"), 1);
    assert_eq!(store.increment_sequence(&a).expect("a"), 2);
    assert_eq!(store.increment_sequence(&b).expect("b"), 1);
    store.set_version(&a, "1.1").expect("set a");

    assert_eq!(store.read_version(&b).expect("read b"), None);
    let listed = store.list_counters().expect("list");
    assert_eq!(
        listed.iter().map(|r| (r.key.as_str(), r.seq)).collect::<Vec<_>>(),
        vec![("form-a", 2), ("form-b", 1)]
    );
}

#[test]
fn concurrent_increments_from_independent_connections_never_collide() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 25;

    let dir = tempfile::tempdir().expect("temp dir");
    drop(SqliteStore::open(dir.path()).expect("install schema"));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles = (0..THREADS)
        .map(|_| {
            let path = dir.path().to_path_buf();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                let mut store = SqliteStore::open_with_timeout(&path, Duration::from_secs(30))
                    .expect("open store");
                let key = key("forms.concurrent");
                barrier.wait();
                (0..PER_THREAD)
                    .map(|_| store.increment_sequence(&key).expect("increment"))
                    .collect::<Vec<u64>>()
            })
        })
        .collect::<Vec<_>>();

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.join().expect("thread joined"));
    }

    let total = (THREADS * PER_THREAD) as u64;
    let distinct = all.iter().copied().collect::<BTreeSet<u64>>();
    assert_eq!(all.len() as u64, total);
    assert_eq!(distinct.len() as u64, total, "duplicate sequence observed");
    assert_eq!(distinct, (1..=total).collect::<BTreeSet<u64>>());
}

#[test]
fn version_round_trips_as_text() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut store = SqliteStore::open(dir.path()).expect("open store");
    let key = key("forms.version");
    store.increment_sequence(&key).expect("increment");

    store.set_version(&key, "1.1").expect("set version");
    assert_eq!(
        store.read_version(&key).expect("read"),
        Some(StoredVersion::Text("1.1".to_string()))
    );

    store.set_version(&key, "\"2.5\"").expect("set quoted version");
    assert_eq!(
        store.read_version(&key).expect("read"),
        Some(StoredVersion::Text("\"2.5\"".to_string()))
    );
}

#[test]
fn raw_numeric_versions_written_by_other_tools_are_read_as_numbers() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut store = SqliteStore::open(dir.path()).expect("open store");
    let key = key("forms.raw");
    store.increment_sequence(&key).expect("increment");

    let conn = Connection::open(dir.path().join(DB_FILE_NAME)).expect("open db");
    conn.execute(
        "UPDATE form_counters SET version=?2 WHERE key=?1",
        params![key.as_str(), 3.4f64],
    )
    .expect("write real");
    assert_eq!(
        store.read_version(&key).expect("read"),
        Some(StoredVersion::Real(3.4))
    );

    conn.execute(
        "UPDATE form_counters SET version=?2 WHERE key=?1",
        params![key.as_str(), 2i64],
    )
    .expect("write integer");
    assert_eq!(
        store.read_version(&key).expect("read"),
        Some(StoredVersion::Integer(2))
    );
}

#[test]
fn set_version_on_missing_key_is_reported() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut store = SqliteStore::open(dir.path()).expect("open store");
    let err = store
        .set_version(&key("forms.missing"), "1.0")
        .expect_err("missing key must fail");
    match err {
        StoreError::UnknownKey { key } => assert_eq!(key, "forms.missing"),
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn counters_survive_reopen() {
    let dir = tempfile::tempdir().expect("temp dir");
    let key = key("forms.durable");
    {
        let mut store = SqliteStore::open(dir.path()).expect("open store");
        store.increment_sequence(&key).expect("increment");
        store.increment_sequence(&key).expect("increment");
        store.set_version(&key, "1.1").expect("set version");
    }

    let mut store = SqliteStore::open(dir.path()).expect("reopen store");
    assert_eq!(store.schema_version().expect("schema version"), 1);
    assert_eq!(
        store.read_version(&key).expect("read"),
        Some(StoredVersion::Text("1.1".to_string()))
    );
    assert_eq!(store.increment_sequence(&key).expect("increment"), 3);

    let read_only = SqliteStore::open_read_only(dir.path()).expect("open read only");
    assert_eq!(read_only.counter(&key).expect("counter").expect("row").seq, 3);
}

#[test]
fn sequence_exhaustion_is_an_error_not_a_wrap() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut store = SqliteStore::open(dir.path()).expect("open store");
    let key = key("forms.exhausted");
    store.increment_sequence(&key).expect("increment");

    let conn = Connection::open(dir.path().join(DB_FILE_NAME)).expect("open db");
    conn.execute(
        "UPDATE form_counters SET seq=?2 WHERE key=?1",
        params![key.as_str(), i64::MAX],
    )
    .expect("force max");

    let err = store
        .increment_sequence(&key)
        .expect_err("exhausted counter must fail");
    assert!(matches!(err, StoreError::SequenceExhausted { .. }));
    assert_eq!(store.counter(&key).expect("counter").expect("row").seq, i64::MAX as u64);
}

#[test]
fn held_write_lock_surfaces_as_timeout() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut store = SqliteStore::open_with_timeout(dir.path(), Duration::from_millis(50))
        .expect("open store");
    let key = key("forms.locked");

    let mut blocker = Connection::open(dir.path().join(DB_FILE_NAME)).expect("open db");
    let tx = blocker
        .transaction_with_behavior(rusqlite::TransactionBehavior::Exclusive)
        .expect("exclusive tx");

    let err = store
        .increment_sequence(&key)
        .expect_err("locked store must fail");
    assert!(err.is_timeout(), "expected busy error, got {err:?}");
    drop(tx);

    assert_eq!(store.increment_sequence(&key).expect("increment"), 1);
}

#[test]
fn foreign_database_files_are_refused() {
    let dir = tempfile::tempdir().expect("temp dir");
    {
        let conn = Connection::open(dir.path().join(DB_FILE_NAME)).expect("open db");
        conn.execute_batch("CREATE TABLE unrelated (id INTEGER PRIMARY KEY);")
            .expect("create table");
    }
    let err = SqliteStore::open(dir.path()).expect_err("foreign schema must be refused");
    assert!(matches!(err, StoreError::ResetRequired(_)));

    let conn = Connection::open(dir.path().join(DB_FILE_NAME)).expect("reopen db");
    let journal_mode: String = conn
        .query_row("PRAGMA journal_mode", [], |row| row.get(0))
        .expect("journal mode");
    assert_eq!(journal_mode, "delete");
    let tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table'",
            [],
            |row| row.get(0),
        )
        .expect("table count");
    assert_eq!(tables, 1);
}

#[test]
fn connect_requires_an_installed_store() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = SqliteStore::connect(dir.path(), Duration::from_millis(100))
        .expect_err("missing database must not be created");
    assert!(matches!(err, StoreError::Sql(_)));

    drop(SqliteStore::open(dir.path()).expect("install schema"));
    let mut store =
        SqliteStore::connect(dir.path(), Duration::from_millis(100)).expect("connect");
    assert_eq!(store.increment_sequence(&key("forms.connect")).expect("increment"), 1);
    assert_eq!(store.storage_dir(), dir.path());
}
