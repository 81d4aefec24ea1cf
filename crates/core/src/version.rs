#![forbid(unsafe_code)]

/// Revision number of a form template with one fractional digit.
///
/// Held as a count of tenths so repeated `+0.1` steps never accumulate binary
/// floating point error. Floats only appear at the storage boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    tenths: u64,
}

impl Version {
    pub const BASELINE: Version = Version { tenths: 10 };

    pub const fn from_tenths(tenths: u64) -> Self {
        Self { tenths }
    }

    /// Rounds to the nearest tenth, half away from zero. Rejects NaN,
    /// infinities, negatives and values too large to represent.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        let scaled = (value * 10.0).round();
        if scaled >= u64::MAX as f64 {
            return None;
        }
        Some(Self {
            tenths: scaled as u64,
        })
    }

    pub fn as_f64(self) -> f64 {
        self.tenths as f64 / 10.0
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self {
            tenths: self.tenths.saturating_add(1),
        }
    }

    /// Serialized form written back to the counter store: a JSON number.
    pub fn to_stored(self) -> String {
        self.to_string()
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::BASELINE
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.tenths / 10, self.tenths % 10)
    }
}

/// Raw version value exactly as the store handed it back.
#[derive(Clone, Debug, PartialEq)]
pub enum StoredVersion {
    Text(String),
    Integer(i64),
    Real(f64),
}

impl StoredVersion {
    /// Accepts a raw number, numeric text (`1.1`) or JSON-quoted numeric
    /// text (`"1.1"`).
    pub fn parse(&self) -> Result<Version, VersionParseError> {
        match self {
            Self::Integer(value) => Version::from_f64(*value as f64).ok_or_else(|| {
                VersionParseError::OutOfRange {
                    raw: value.to_string(),
                }
            }),
            Self::Real(value) => {
                Version::from_f64(*value).ok_or_else(|| VersionParseError::OutOfRange {
                    raw: value.to_string(),
                })
            }
            Self::Text(raw) => parse_version_text(raw),
        }
    }
}

fn parse_version_text(raw: &str) -> Result<Version, VersionParseError> {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .map(str::trim)
        .unwrap_or(trimmed);
    if unquoted.is_empty()
        || !unquoted
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'))
    {
        return Err(VersionParseError::NotNumeric {
            raw: raw.to_string(),
        });
    }
    let value = unquoted
        .parse::<f64>()
        .map_err(|_| VersionParseError::NotNumeric {
            raw: raw.to_string(),
        })?;
    Version::from_f64(value).ok_or_else(|| VersionParseError::OutOfRange {
        raw: raw.to_string(),
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionParseError {
    NotNumeric { raw: String },
    OutOfRange { raw: String },
}

impl VersionParseError {
    pub fn raw(&self) -> &str {
        match self {
            Self::NotNumeric { raw } | Self::OutOfRange { raw } => raw,
        }
    }
}

impl std::fmt::Display for VersionParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotNumeric { raw } => write!(f, "stored version is not numeric: {raw:?}"),
            Self::OutOfRange { raw } => write!(f, "stored version is out of range: {raw}"),
        }
    }
}

impl std::error::Error for VersionParseError {}

/// Version for the next allocation given the currently stored value.
///
/// Absent means baseline. A value that cannot be interpreted also resets to
/// the baseline; the parse error is handed back so the caller can report it.
pub fn next_version(stored: Option<&StoredVersion>) -> (Version, Option<VersionParseError>) {
    let Some(stored) = stored else {
        return (Version::BASELINE, None);
    };
    match stored.parse() {
        Ok(current) => (current.next(), None),
        Err(err) => (Version::BASELINE, Some(err)),
    }
}
