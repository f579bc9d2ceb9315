//! Lsn - Write-ahead log position
//!
//! An LSN is a 64-bit byte position in the log stream. Positions are
//! totally ordered; zero is reserved as the "not yet known" sentinel.
//!
//! The text form is two hexadecimal halves separated by a slash
//! (`16/B374D848`), which is how operators copy positions between tools.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A write-ahead log position.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Lsn(u64);

impl Lsn {
    /// Sentinel meaning "position not known".
    pub const INVALID: Lsn = Lsn(0);

    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Builds a position from its high and low 32-bit halves.
    #[inline]
    pub const fn from_parts(high: u32, low: u32) -> Self {
        Self(((high as u64) << 32) | low as u64)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }

    /// Number of the WAL segment containing this position.
    pub fn segment_number(&self, segment_size: u64) -> u64 {
        self.0 / segment_size
    }

    /// Position advanced by `bytes`, saturating at the end of the address space.
    pub fn advance(&self, bytes: u64) -> Self {
        Self(self.0.saturating_add(bytes))
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}/{:X}", self.0 >> 32, self.0 as u32)
    }
}

/// Error returned when an LSN string is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid input syntax for type lsn: \"{input}\"")]
pub struct LsnParseError {
    input: String,
}

impl FromStr for Lsn {
    type Err = LsnParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || LsnParseError {
            input: s.to_string(),
        };

        let (high, low) = s.trim().split_once('/').ok_or_else(err)?;
        if high.is_empty() || low.is_empty() || high.len() > 8 || low.len() > 8 {
            return Err(err());
        }

        let high = u32::from_str_radix(high, 16).map_err(|_| err())?;
        let low = u32::from_str_radix(low, 16).map_err(|_| err())?;

        Ok(Lsn::from_parts(high, low))
    }
}

impl Serialize for Lsn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Lsn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
