//! Slot metrics
//!
//! - Counters only
//! - Monotonic increase, reset only on process start
//! - Relaxed atomics; values are exact once all writers are done

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the slot registry and the creation pipeline.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    slots_created: AtomicU64,
    creation_failures: AtomicU64,
    permission_denials: AtomicU64,
    timeline_conflicts: AtomicU64,
    timeline_overrides: AtomicU64,
    slots_discarded: AtomicU64,
    slots_dropped: AtomicU64,
    slot_saves: AtomicU64,
    state_unknown: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_slots_created(&self) {
        self.slots_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_creation_failures(&self) {
        self.creation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_permission_denials(&self) {
        self.permission_denials.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_timeline_conflicts(&self) {
        self.timeline_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_timeline_overrides(&self) {
        self.timeline_overrides.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_slots_discarded(&self) {
        self.slots_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_slots_dropped(&self) {
        self.slots_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_slot_saves(&self) {
        self.slot_saves.fetch_add(1, Ordering::Relaxed);
    }

    /// A failure left a slot's durable state unverified
    pub fn increment_state_unknown(&self) {
        self.state_unknown.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            slots_created: self.slots_created.load(Ordering::Relaxed),
            creation_failures: self.creation_failures.load(Ordering::Relaxed),
            permission_denials: self.permission_denials.load(Ordering::Relaxed),
            timeline_conflicts: self.timeline_conflicts.load(Ordering::Relaxed),
            timeline_overrides: self.timeline_overrides.load(Ordering::Relaxed),
            slots_discarded: self.slots_discarded.load(Ordering::Relaxed),
            slots_dropped: self.slots_dropped.load(Ordering::Relaxed),
            slot_saves: self.slot_saves.load(Ordering::Relaxed),
            state_unknown: self.state_unknown.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the metrics counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub slots_created: u64,
    pub creation_failures: u64,
    pub permission_denials: u64,
    pub timeline_conflicts: u64,
    pub timeline_overrides: u64,
    pub slots_discarded: u64,
    pub slots_dropped: u64,
    pub slot_saves: u64,
    pub state_unknown: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let metrics = MetricsRegistry::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_counters_increment_independently() {
        let metrics = MetricsRegistry::new();
        metrics.increment_slots_created();
        metrics.increment_slots_created();
        metrics.increment_timeline_overrides();

        let snap = metrics.snapshot();
        assert_eq!(snap.slots_created, 2);
        assert_eq!(snap.timeline_overrides, 1);
        assert_eq!(snap.creation_failures, 0);
    }
}
