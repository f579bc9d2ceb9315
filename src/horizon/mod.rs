//! Transaction horizon coordination
//!
//! Garbage collection may only reclaim row versions older than every
//! horizon a replication slot has pinned. This module owns the
//! process-wide aggregate of those pins together with the transaction
//! table the safe-horizon estimate is computed from.
//!
//! # Locking
//!
//! One coordinator lock protects the whole aggregate. It is held only for
//! read-recompute-publish sequences and never across I/O. While holding
//! it, recomputation briefly takes each slot's own lock (global then
//! slot-local, the same order garbage collection uses). Callers must not
//! hold a slot lock when entering the coordinator.

mod coordinator;

pub use coordinator::{GlobalHorizon, HorizonCoordinator, SlotXmins, XminSource};
