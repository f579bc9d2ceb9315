//! Horizon coordinator
//!
//! A pinned horizon is only safe if no concurrent recomputation can
//! advance the global minimum between reading the estimate and
//! publishing the slot's contribution. `reserve` therefore reads the
//! estimate, pins the slot and republishes under one lock hold.

use std::collections::BTreeSet;

use parking_lot::Mutex;

use crate::types::TransactionId;

/// Effective horizons advertised by one live slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotXmins {
    pub xmin: TransactionId,
    pub catalog_xmin: TransactionId,
}

/// Anything that can enumerate live slot horizons.
pub trait XminSource {
    fn slot_xmins(&self) -> Vec<SlotXmins>;
}

/// The published aggregate over all live slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalHorizon {
    /// Oldest data xmin any slot needs; invalid if none
    pub slot_xmin: TransactionId,
    /// Oldest catalog xmin any slot needs; invalid if none
    pub slot_catalog_xmin: TransactionId,
}

impl GlobalHorizon {
    /// Oldest of both pins, invalid if no slot pins anything.
    pub fn min_xmin(&self) -> TransactionId {
        TransactionId::older_valid(self.slot_xmin, self.slot_catalog_xmin)
    }
}

#[derive(Debug)]
struct HorizonState {
    next_xid: TransactionId,
    running: BTreeSet<TransactionId>,
    published: GlobalHorizon,
}

impl HorizonState {
    /// Oldest xid for which no other transaction could still produce
    /// dependent catalog rows.
    fn safe_decoding_horizon(&self, need_full_snapshot: bool) -> TransactionId {
        let mut oldest = self.next_xid;

        if self.published.slot_xmin.is_valid() && self.published.slot_xmin < oldest {
            oldest = self.published.slot_xmin;
        }

        if !need_full_snapshot
            && self.published.slot_catalog_xmin.is_valid()
            && self.published.slot_catalog_xmin < oldest
        {
            oldest = self.published.slot_catalog_xmin;
        }

        if let Some(&running) = self.running.iter().next() {
            if running < oldest {
                oldest = running;
            }
        }

        oldest
    }

    fn publish(&mut self, source: &dyn XminSource) -> GlobalHorizon {
        let mut agg = GlobalHorizon::default();
        for slot in source.slot_xmins() {
            agg.slot_xmin = TransactionId::older_valid(agg.slot_xmin, slot.xmin);
            agg.slot_catalog_xmin =
                TransactionId::older_valid(agg.slot_catalog_xmin, slot.catalog_xmin);
        }
        self.published = agg;
        agg
    }
}

/// Process-wide horizon aggregate and transaction table.
#[derive(Debug)]
pub struct HorizonCoordinator {
    state: Mutex<HorizonState>,
}

impl Default for HorizonCoordinator {
    fn default() -> Self {
        Self::new(TransactionId::FIRST_NORMAL)
    }
}

impl HorizonCoordinator {
    /// Create a coordinator whose next assigned xid is `next_xid`.
    pub fn new(next_xid: TransactionId) -> Self {
        let next_xid = next_xid.max(TransactionId::FIRST_NORMAL);
        Self {
            state: Mutex::new(HorizonState {
                next_xid,
                running: BTreeSet::new(),
                published: GlobalHorizon::default(),
            }),
        }
    }

    // =========================================================================
    // TRANSACTION TABLE
    // =========================================================================

    /// Assign an xid to a transaction that is about to write.
    pub fn begin_transaction(&self) -> TransactionId {
        let mut state = self.state.lock();
        let xid = state.next_xid;
        state.next_xid = xid.next();
        state.running.insert(xid);
        xid
    }

    /// Mark a transaction finished (committed or aborted).
    pub fn end_transaction(&self, xid: TransactionId) {
        self.state.lock().running.remove(&xid);
    }

    /// Next xid to be assigned.
    pub fn next_xid(&self) -> TransactionId {
        self.state.lock().next_xid
    }

    /// Oldest in-progress transaction, if any.
    pub fn oldest_running(&self) -> Option<TransactionId> {
        self.state.lock().running.iter().next().copied()
    }

    // =========================================================================
    // HORIZON
    // =========================================================================

    /// Current safe-horizon estimate.
    ///
    /// Without `reserve` the value may be stale as soon as it is returned;
    /// use it for diagnostics only.
    pub fn current_safe_horizon(&self, need_full_snapshot: bool) -> TransactionId {
        self.state.lock().safe_decoding_horizon(need_full_snapshot)
    }

    /// Read the safe horizon, pin it through `pin`, then republish the
    /// aggregate, all under the coordinator lock.
    ///
    /// `pin` must only touch slot-local state; `source` is read after
    /// `pin` so the published value includes the new pin.
    pub fn reserve<F>(
        &self,
        need_full_snapshot: bool,
        source: &dyn XminSource,
        pin: F,
    ) -> TransactionId
    where
        F: FnOnce(TransactionId),
    {
        let mut state = self.state.lock();
        let horizon = state.safe_decoding_horizon(need_full_snapshot);
        pin(horizon);
        state.publish(source);
        horizon
    }

    /// Recompute and publish the aggregate from the live slots.
    pub fn recompute_required_minimum(&self, source: &dyn XminSource) -> GlobalHorizon {
        self.state.lock().publish(source)
    }

    /// Last published aggregate.
    pub fn published(&self) -> GlobalHorizon {
        self.state.lock().published
    }

    /// Oldest xid garbage collection must preserve for catalog rows.
    ///
    /// Everything strictly older may be reclaimed.
    pub fn gc_horizon(&self) -> TransactionId {
        let state = self.state.lock();
        let mut oldest = state.next_xid;
        if let Some(&running) = state.running.iter().next() {
            oldest = oldest.min(running);
        }
        TransactionId::older_valid(oldest, state.published.min_xmin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FixedSlots(RefCell<Vec<SlotXmins>>);

    impl XminSource for FixedSlots {
        fn slot_xmins(&self) -> Vec<SlotXmins> {
            self.0.borrow().clone()
        }
    }

    fn xid(v: u32) -> TransactionId {
        TransactionId::new(v)
    }

    #[test]
    fn test_transactions_get_increasing_ids() {
        let coord = HorizonCoordinator::new(xid(100));
        let a = coord.begin_transaction();
        let b = coord.begin_transaction();
        assert_eq!(a, xid(100));
        assert_eq!(b, xid(101));
        assert_eq!(coord.oldest_running(), Some(a));

        coord.end_transaction(a);
        assert_eq!(coord.oldest_running(), Some(b));
    }

    #[test]
    fn test_reserved_ids_are_skipped() {
        let coord = HorizonCoordinator::new(xid(1));
        assert_eq!(coord.next_xid(), TransactionId::FIRST_NORMAL);
    }

    #[test]
    fn test_safe_horizon_respects_running_transactions() {
        let coord = HorizonCoordinator::new(xid(100));
        let a = coord.begin_transaction();
        coord.begin_transaction();
        assert_eq!(coord.current_safe_horizon(false), a);

        coord.end_transaction(a);
        assert_eq!(coord.current_safe_horizon(false), xid(101));
    }

    #[test]
    fn test_safe_horizon_with_no_activity_is_next_xid() {
        let coord = HorizonCoordinator::new(xid(50));
        assert_eq!(coord.current_safe_horizon(false), xid(50));
    }

    #[test]
    fn test_reserve_publishes_pin() {
        let coord = HorizonCoordinator::new(xid(100));
        let slots = FixedSlots(RefCell::new(Vec::new()));

        let pinned = coord.reserve(false, &slots, |h| {
            slots.0.borrow_mut().push(SlotXmins {
                xmin: TransactionId::INVALID,
                catalog_xmin: h,
            });
        });

        assert_eq!(pinned, xid(100));
        assert_eq!(coord.published().slot_catalog_xmin, xid(100));
        assert!(!coord.published().slot_xmin.is_valid());
        assert_eq!(coord.published().min_xmin(), xid(100));
    }

    #[test]
    fn test_existing_catalog_pin_holds_estimate_back() {
        let coord = HorizonCoordinator::new(xid(100));
        let slots = FixedSlots(RefCell::new(vec![SlotXmins {
            xmin: TransactionId::INVALID,
            catalog_xmin: xid(40),
        }]));
        coord.recompute_required_minimum(&slots);

        assert_eq!(coord.current_safe_horizon(false), xid(40));
        // A full snapshot only honours data pins
        assert_eq!(coord.current_safe_horizon(true), xid(100));
    }

    #[test]
    fn test_recompute_after_removal_releases_pin() {
        let coord = HorizonCoordinator::new(xid(100));
        let slots = FixedSlots(RefCell::new(vec![SlotXmins {
            xmin: TransactionId::INVALID,
            catalog_xmin: xid(60),
        }]));
        coord.recompute_required_minimum(&slots);
        assert_eq!(coord.gc_horizon(), xid(60));

        slots.0.borrow_mut().clear();
        coord.recompute_required_minimum(&slots);
        assert_eq!(coord.published(), GlobalHorizon::default());
        assert_eq!(coord.gc_horizon(), xid(100));
    }

    #[test]
    fn test_gc_horizon_never_passes_a_pin() {
        let coord = HorizonCoordinator::new(xid(100));
        let slots = FixedSlots(RefCell::new(Vec::new()));
        let pinned = coord.reserve(false, &slots, |h| {
            slots.0.borrow_mut().push(SlotXmins {
                xmin: TransactionId::INVALID,
                catalog_xmin: h,
            });
        });

        for _ in 0..10 {
            let x = coord.begin_transaction();
            coord.end_transaction(x);
        }
        assert!(coord.gc_horizon() <= pinned);
    }
}
