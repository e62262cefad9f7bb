//! Hierarchical account codes.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Account code is not a dot-separated sequence of digit segments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid account code '{0}': expected digit segments separated by dots")]
pub struct InvalidAccountCode(pub String);

/// An account code such as `1`, `1.1`, `1101` or `4.1.02`.
///
/// Codes order segment by segment, numerically, so `1.2` sorts before `1.10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountCode(String);

impl AccountCode {
    /// Parses and validates a code. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is empty, has an empty segment, or
    /// contains anything other than ASCII digits and dots.
    pub fn parse(raw: &str) -> Result<Self, InvalidAccountCode> {
        let code = raw.trim();
        let valid = !code.is_empty()
            && code
                .split('.')
                .all(|segment| !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()));

        if valid {
            Ok(Self(code.to_string()))
        } else {
            Err(InvalidAccountCode(raw.to_string()))
        }
    }

    /// Returns the code as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates the digit segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }
}

/// Compares two digit strings by numeric value without parsing them.
fn compare_segment(a: &str, b: &str) -> Ordering {
    let a_trimmed = a.trim_start_matches('0');
    let b_trimmed = b.trim_start_matches('0');
    a_trimmed
        .len()
        .cmp(&b_trimmed.len())
        .then_with(|| a_trimmed.cmp(b_trimmed))
}

impl Ord for AccountCode {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut left = self.segments();
        let mut right = other.segments();
        loop {
            match (left.next(), right.next()) {
                (Some(a), Some(b)) => match compare_segment(a, b) {
                    Ordering::Equal => {}
                    unequal => return unequal,
                },
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                // "01" and "1" are numerically equal; fall back to the text.
                (None, None) => return self.0.cmp(&other.0),
            }
        }
    }
}

impl PartialOrd for AccountCode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl TryFrom<String> for AccountCode {
    type Error = InvalidAccountCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AccountCode> for String {
    fn from(code: AccountCode) -> Self {
        code.0
    }
}

impl std::str::FromStr for AccountCode {
    type Err = InvalidAccountCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for AccountCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
