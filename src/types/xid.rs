//! TransactionId - Transaction horizon marker
//!
//! Transaction ids are handed out in increasing order. Ids below
//! `FIRST_NORMAL` are reserved. Comparison is plain numeric; epoch
//! wraparound is outside the scope of this crate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A transaction id.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Serialize, Deserialize)]
pub struct TransactionId(u32);

impl TransactionId {
    /// Sentinel meaning "no transaction".
    pub const INVALID: TransactionId = TransactionId(0);

    /// First id assigned to a regular transaction.
    pub const FIRST_NORMAL: TransactionId = TransactionId(3);

    #[inline]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[inline]
    pub fn value(&self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }

    /// The id following this one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Older of two ids, ignoring invalid ones.
    pub fn older_valid(a: Self, b: Self) -> Self {
        match (a.is_valid(), b.is_valid()) {
            (true, true) => a.min(b),
            (true, false) => a,
            (false, _) => b,
        }
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_older_valid_skips_invalid() {
        let a = TransactionId::new(10);
        let b = TransactionId::new(7);
        assert_eq!(TransactionId::older_valid(a, b), b);
        assert_eq!(TransactionId::older_valid(a, TransactionId::INVALID), a);
        assert_eq!(TransactionId::older_valid(TransactionId::INVALID, b), b);
        assert_eq!(
            TransactionId::older_valid(TransactionId::INVALID, TransactionId::INVALID),
            TransactionId::INVALID
        );
    }

    #[test]
    fn test_first_normal_is_valid() {
        assert!(TransactionId::FIRST_NORMAL.is_valid());
        assert!(!TransactionId::INVALID.is_valid());
    }
}
