//! Core value types shared by every stage of slot creation.
//!
//! This module provides:
//! - `Lsn` - Totally ordered write-ahead log position
//! - `TransactionId` - Transaction horizon marker
//! - `TimelineId` - Timeline branch identifier
//! - `ProcessId` - Identity of the process owning an acquired slot

mod lsn;
mod xid;

pub use lsn::{Lsn, LsnParseError};
pub use xid::TransactionId;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Timeline branch identifier.
///
/// A new timeline is created every time a server is promoted; the id
/// increases by one for each branch.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct TimelineId(u32);

impl TimelineId {
    /// Creates a timeline id from its numeric value.
    #[inline]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the numeric value.
    #[inline]
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TimelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a server process.
///
/// Used to express which process has a slot acquired.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ProcessId(u32);

impl ProcessId {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// The id of the running process.
    pub fn current() -> Self {
        Self(std::process::id())
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
