//! Dotted version tags and the lenient version comparator.
//!
//! Versions are sequences of non-negative integers separated by `.`
//! (canonically `major.minor.patch`). Shorter tags are right-padded with
//! zeros when compared, so `1.0` and `1.0.0` are the same version and
//! four-segment schemes like `2.1.0.7` order correctly against three-segment
//! ones.

use crate::error::UpdateError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A parsed dotted version such as `1.4.2`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionTag {
    segments: Vec<u64>,
}

impl VersionTag {
    /// Builds a canonical three-segment tag.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            segments: vec![major, minor, patch],
        }
    }

    pub fn major(&self) -> u64 {
        self.segment(0)
    }

    pub fn minor(&self) -> u64 {
        self.segment(1)
    }

    pub fn patch(&self) -> u64 {
        self.segment(2)
    }

    /// Raw segments as parsed, without zero padding.
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    fn segment(&self, index: usize) -> u64 {
        self.segments.get(index).copied().unwrap_or(0)
    }
}

impl Default for VersionTag {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

impl FromStr for VersionTag {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments = s
            .split('.')
            .map(|part| {
                part.trim().parse::<u64>().map_err(|_| {
                    UpdateError::Parse(format!("invalid version segment {part:?} in {s:?}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }
}

impl TryFrom<String> for VersionTag {
    type Error = UpdateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VersionTag> for String {
    fn from(tag: VersionTag) -> Self {
        tag.to_string()
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        Ok(())
    }
}

impl Ord for VersionTag {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        (0..len)
            .map(|i| self.segment(i).cmp(&other.segment(i)))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for VersionTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for VersionTag {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionTag {}

/// Compares two dotted version strings numerically.
///
/// If either string has a non-numeric segment the comparison is treated as
/// indeterminate and `Equal` is returned. Do not use this to validate
/// versions; parse a [`VersionTag`] instead.
pub fn compare(a: &str, b: &str) -> Ordering {
    match (a.parse::<VersionTag>(), b.parse::<VersionTag>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Err(e), _) | (_, Err(e)) => {
            tracing::debug!(error = %e, "version comparison indeterminate");
            Ordering::Equal
        }
    }
}
