//! Crash tests for slotanchor
//!
//! - All crash tests are here
//! - Each scenario runs the real binary in its own data directory
//! - Real filesystem (no mocks)

mod crash;
