#![forbid(unsafe_code)]

pub const SUPPLIER_DUE_DILIGENCE_KEY: &str = "SUPPLIER_DUE_DILIGENCE_QUESTIONNAIRE";
pub const SUPPLIER_DUE_DILIGENCE_PREFIX: &str = "QAF-SDD";

const MAX_KEY_LEN: usize = 128;
const MAX_PREFIX_LEN: usize = 32;

/// Logical document type a counter row belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CounterKey(String);

impl CounterKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn try_new(value: impl Into<String>) -> Result<Self, CounterKeyError> {
        let value = value.into();
        let value = value.trim();
        validate_counter_key(value)?;
        Ok(Self(value.to_string()))
    }

    pub fn supplier_due_diligence() -> Self {
        Self(SUPPLIER_DUE_DILIGENCE_KEY.to_string())
    }
}

impl std::fmt::Display for CounterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CounterKeyError {
    Empty,
    TooLong,
    InvalidFirstChar,
    InvalidChar { ch: char, index: usize },
}

impl CounterKeyError {
    pub fn message(&self) -> String {
        match self {
            Self::Empty => "counter key must not be empty".to_string(),
            Self::TooLong => format!("counter key must be at most {MAX_KEY_LEN} bytes"),
            Self::InvalidFirstChar => "counter key must start with an ASCII letter or digit".to_string(),
            Self::InvalidChar { ch, index } => {
                format!("counter key has invalid char {ch:?} at index {index}")
            }
        }
    }
}

impl std::fmt::Display for CounterKeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for CounterKeyError {}

fn validate_counter_key(value: &str) -> Result<(), CounterKeyError> {
    if value.is_empty() {
        return Err(CounterKeyError::Empty);
    }
    if value.len() > MAX_KEY_LEN {
        return Err(CounterKeyError::TooLong);
    }
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return Err(CounterKeyError::Empty);
    };
    if !first.is_ascii_alphanumeric() {
        return Err(CounterKeyError::InvalidFirstChar);
    }
    for (offset, ch) in chars.enumerate() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.' | ':') {
            continue;
        }
        return Err(CounterKeyError::InvalidChar {
            ch,
            index: offset + 1,
        });
    }
    Ok(())
}

/// Fixed leading part of a form code, e.g. `QAF-SDD`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CodePrefix(String);

impl CodePrefix {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn try_new(value: impl Into<String>) -> Result<Self, CodePrefixError> {
        let value = value.into();
        let value = value.trim();
        if value.is_empty() {
            return Err(CodePrefixError::Empty);
        }
        if value.len() > MAX_PREFIX_LEN {
            return Err(CodePrefixError::TooLong);
        }
        if let Some(ch) = value
            .chars()
            .find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_')))
        {
            return Err(CodePrefixError::InvalidChar(ch));
        }
        if value.ends_with('-') {
            return Err(CodePrefixError::TrailingSeparator);
        }
        Ok(Self(value.to_string()))
    }

    pub fn supplier_due_diligence() -> Self {
        Self(SUPPLIER_DUE_DILIGENCE_PREFIX.to_string())
    }
}

impl std::fmt::Display for CodePrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CodePrefixError {
    Empty,
    TooLong,
    InvalidChar(char),
    TrailingSeparator,
}

impl CodePrefixError {
    pub fn message(&self) -> String {
        match self {
            Self::Empty => "code prefix must not be empty".to_string(),
            Self::TooLong => format!("code prefix must be at most {MAX_PREFIX_LEN} bytes"),
            Self::InvalidChar(ch) => format!("code prefix has invalid char {ch:?}"),
            Self::TrailingSeparator => "code prefix must not end with '-'".to_string(),
        }
    }
}

impl std::fmt::Display for CodePrefixError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for CodePrefixError {}
