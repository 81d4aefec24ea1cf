#![forbid(unsafe_code)]

use crate::logging::LogFormat;
use qaf_core::ids::{CodePrefixError, CounterKeyError};
use qaf_core::{CodePrefix, CounterKey};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const SERVER_NAME: &str = "qaf_server";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_STORAGE_DIR: &str = ".qaf_counters";
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_ROUTE: &str = "/api/supplier-questionnaire/form-code";
pub const HEALTH_ROUTE: &str = "/healthz";

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

#[derive(Clone, Debug)]
pub struct Config {
    pub storage_dir: PathBuf,
    pub bind: SocketAddr,
    pub route: String,
    pub key: CounterKey,
    pub prefix: CodePrefix,
    pub busy_timeout: Duration,
    pub request_timeout: Duration,
    pub log_format: LogFormat,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid --counter-key: {0}")]
    CounterKey(#[from] CounterKeyError),
    #[error("invalid --code-prefix: {0}")]
    CodePrefix(#[from] CodePrefixError),
    #[error("invalid --bind {value:?}: {source}")]
    Bind {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("invalid --route {0:?}: must be an absolute path without query or whitespace")]
    Route(String),
    #[error("--route must not shadow /healthz")]
    RouteShadowsHealth,
    #[error("invalid --log-format {0:?}: expected text or json")]
    LogFormat(String),
}

pub fn usage() -> &'static str {
    "qaf_server: sequential form code / version allocator over HTTP\n\n\
USAGE:\n\
  qaf_server [--storage-dir DIR] [--bind ADDR] [--route PATH]\n\
             [--counter-key KEY] [--code-prefix PREFIX]\n\
             [--busy-timeout-ms N] [--request-timeout-ms N] [--log-format text|json]\n\
\n\
FLAGS:\n\
  -h, --help       Print this help and exit\n\
  -V, --version    Print version and exit\n\
\n\
ENV:\n\
  QAF_STORAGE_DIR, QAF_HTTP_BIND, QAF_ROUTE, QAF_COUNTER_KEY, QAF_CODE_PREFIX,\n\
  QAF_BUSY_TIMEOUT_MS, QAF_REQUEST_TIMEOUT_MS, QAF_LOG_FORMAT, RUST_LOG\n"
}

pub fn version_line() -> String {
    format!("{SERVER_NAME} {SERVER_VERSION}")
}

pub fn wants_help(args: &[String]) -> bool {
    args.iter().any(|arg| matches!(arg.as_str(), "-h" | "--help"))
}

pub fn wants_version(args: &[String]) -> bool {
    args.iter().any(|arg| matches!(arg.as_str(), "-V" | "--version"))
}

impl Config {
    /// Each setting is taken from its flag, then its environment variable,
    /// then the default.
    pub fn parse(
        args: &[String],
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let setting = |flag: &str, var: &str| {
            flag_value(args, flag)
                .or_else(|| env(var))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let storage_dir = setting("--storage-dir", "QAF_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR));

        let bind_raw =
            setting("--bind", "QAF_HTTP_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse::<SocketAddr>()
            .map_err(|source| ConfigError::Bind {
                value: bind_raw.clone(),
                source,
            })?;

        let route = setting("--route", "QAF_ROUTE").unwrap_or_else(|| DEFAULT_ROUTE.to_string());
        validate_route(&route)?;

        let key = match setting("--counter-key", "QAF_COUNTER_KEY") {
            Some(value) => CounterKey::try_new(value)?,
            None => CounterKey::supplier_due_diligence(),
        };
        let prefix = match setting("--code-prefix", "QAF_CODE_PREFIX") {
            Some(value) => CodePrefix::try_new(value)?,
            None => CodePrefix::supplier_due_diligence(),
        };

        let busy_timeout = parse_millis(
            setting("--busy-timeout-ms", "QAF_BUSY_TIMEOUT_MS"),
            100..=60_000,
            DEFAULT_BUSY_TIMEOUT_MS,
        );
        let request_timeout = parse_millis(
            setting("--request-timeout-ms", "QAF_REQUEST_TIMEOUT_MS"),
            100..=120_000,
            DEFAULT_REQUEST_TIMEOUT_MS,
        );

        let log_format = match setting("--log-format", "QAF_LOG_FORMAT") {
            Some(value) => value
                .parse::<LogFormat>()
                .map_err(|_| ConfigError::LogFormat(value))?,
            None => LogFormat::Text,
        };

        Ok(Self {
            storage_dir,
            bind,
            route,
            key,
            prefix,
            busy_timeout,
            request_timeout,
            log_format,
        })
    }
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let mut args = args.iter();
    while let Some(arg) = args.next() {
        if arg.as_str() == flag {
            return args.next().cloned();
        }
        if let Some(value) = arg
            .strip_prefix(flag)
            .and_then(|rest| rest.strip_prefix('='))
        {
            return Some(value.to_string());
        }
    }
    None
}

fn parse_millis(
    raw: Option<String>,
    range: std::ops::RangeInclusive<u64>,
    default_ms: u64,
) -> Duration {
    let ms = raw
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| range.contains(value))
        .unwrap_or(default_ms);
    Duration::from_millis(ms)
}

fn validate_route(route: &str) -> Result<(), ConfigError> {
    if !route.starts_with('/')
        || route.len() > 256
        || route.contains(['?', '#', '\\'])
        || route.contains("..")
        || route.chars().any(|ch| ch.is_whitespace() || ch.is_control())
    {
        return Err(ConfigError::Route(route.to_string()));
    }
    if route == HEALTH_ROUTE {
        return Err(ConfigError::RouteShadowsHealth);
    }
    Ok(())
}
