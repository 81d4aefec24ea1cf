#![forbid(unsafe_code)]

mod store;

pub use store::{
    CounterRecord, CounterStore, DB_FILE_NAME, DEFAULT_BUSY_TIMEOUT, SqliteStore, StoreError,
};
