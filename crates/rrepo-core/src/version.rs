//! Ordering of package version strings.
//!
//! Versions are split on `.` and `-`. Digit-only tokens compare by numeric
//! value (any length, leading zeros ignored), other tokens compare as strings,
//! and a digit-only token sorts before a non-numeric one. The shorter version
//! is padded with zero tokens, so `1.0` and `1.0.0` are equal.
//!
//! Malformed versions (empty, containing whitespace, or containing an empty
//! token such as `1..2`) never raise an error: they sort below every
//! well-formed version and equal to each other.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy)]
enum Token<'a> {
    /// Digits with leading zeros stripped; zero is the empty string.
    Number(&'a str),
    Text(&'a str),
}

const ZERO: Token<'static> = Token::Number("");

impl Token<'_> {
    fn cmp_token(&self, other: &Token<'_>) -> Ordering {
        match (self, other) {
            (Token::Number(a), Token::Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Token::Number(_), Token::Text(_)) => Ordering::Less,
            (Token::Text(_), Token::Number(_)) => Ordering::Greater,
            (Token::Text(a), Token::Text(b)) => a.cmp(b),
        }
    }
}

fn tokenize(version: &str) -> Option<Vec<Token<'_>>> {
    if version.is_empty() || version.chars().any(char::is_whitespace) {
        return None;
    }

    version
        .split(['.', '-'])
        .map(|raw| {
            if raw.is_empty() {
                None
            } else if raw.bytes().all(|b| b.is_ascii_digit()) {
                Some(Token::Number(raw.trim_start_matches('0')))
            } else {
                Some(Token::Text(raw))
            }
        })
        .collect()
}

/// Whether `version` parses; malformed versions still compare, as the lowest value.
pub fn is_well_formed(version: &str) -> bool {
    tokenize(version).is_some()
}

/// Compare two version strings.
pub fn compare(a: &str, b: &str) -> Ordering {
    match (tokenize(a), tokenize(b)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(left), Some(right)) => {
            let len = left.len().max(right.len());
            (0..len)
                .map(|i| {
                    let l = left.get(i).unwrap_or(&ZERO);
                    let r = right.get(i).unwrap_or(&ZERO);
                    l.cmp_token(r)
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        }
    }
}

/// A version string ordered by [`compare`].
///
/// Equality follows the ordering, so `PackageVersion::new("1.0") ==
/// PackageVersion::new("1.0.0")` even though the strings differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageVersion(String);

impl PackageVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_well_formed(&self) -> bool {
        is_well_formed(&self.0)
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(&self.0, &other.0)
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PackageVersion {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
