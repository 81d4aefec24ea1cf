#![forbid(unsafe_code)]

pub mod allocator;
pub mod config;
pub mod http;
pub mod logging;
mod clock;

pub use allocator::{AllocateError, Allocation, AllocatorService, allocate};
pub use config::{Config, ConfigError};
pub use clock::format_rfc3339;
