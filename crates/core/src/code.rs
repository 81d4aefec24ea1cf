#![forbid(unsafe_code)]

use crate::ids::CodePrefix;

const MIN_SEQUENCE_WIDTH: usize = 3;

/// Renders a sequence number zero-padded to a minimum width of three digits.
/// Wider values are printed in full.
pub fn format_sequence(seq: u64) -> String {
    format!("{seq:0width$}", width = MIN_SEQUENCE_WIDTH)
}

/// Human-readable identifier of one form instance: `{prefix}-{seq:03}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FormCode {
    prefix: CodePrefix,
    sequence: u64,
    text: String,
}

impl FormCode {
    pub fn new(prefix: &CodePrefix, sequence: u64) -> Self {
        let text = format!("{}-{}", prefix.as_str(), format_sequence(sequence));
        Self {
            prefix: prefix.clone(),
            sequence,
            text,
        }
    }

    pub fn prefix(&self) -> &CodePrefix {
        &self.prefix
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Recovers the sequence number from a code minted under `prefix`.
    pub fn parse(prefix: &CodePrefix, text: &str) -> Option<u64> {
        let digits = text
            .strip_prefix(prefix.as_str())?
            .strip_prefix('-')?;
        if digits.len() < MIN_SEQUENCE_WIDTH || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse::<u64>().ok()
    }
}

impl std::fmt::Display for FormCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}
