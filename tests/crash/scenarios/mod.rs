//! Crash scenarios, one file per operation

pub mod slot;
