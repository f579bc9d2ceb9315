//! Crash testing framework for slotanchor
//!
//! - Crash injection at deterministic points via `SLOTANCHOR_CRASH_POINT`
//! - Subprocess management around the real binary
//! - Post-crash validation by reopening the data directory

pub mod harness;
pub mod scenarios;
pub mod utils;

pub use harness::*;
pub use utils::*;
