#![forbid(unsafe_code)]

pub mod code;
pub mod ids;
pub mod version;

pub use code::{FormCode, format_sequence};
pub use ids::{CodePrefix, CounterKey};
pub use version::{StoredVersion, Version, VersionParseError, next_version};
