#![forbid(unsafe_code)]

use rusqlite::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(rusqlite::Error),
    #[error("sqlite busy (lock wait timed out): {0}")]
    Busy(rusqlite::Error),
    #[error("RESET_REQUIRED: {0}")]
    ResetRequired(&'static str),
    #[error("sequence exhausted for counter key {key}")]
    SequenceExhausted { key: String },
    #[error("unknown counter key: {key}")]
    UnknownKey { key: String },
}

impl StoreError {
    /// True when the store gave up waiting for a write lock held elsewhere.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        if is_busy(&value) {
            Self::Busy(value)
        } else {
            Self::Sql(value)
        }
    }
}

fn is_busy(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, _) => {
            matches!(code.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        }
        _ => false,
    }
}
