//! Acquired slot guard
//!
//! A `SlotHandle` is the calling process's exclusive claim on one slot.
//! Every exit path gives the claim back: `release` and `drop_slot` do so
//! explicitly, and dropping an unfinished handle discards a slot that was
//! never promoted (or releases a persistent one). Either way the horizon
//! aggregate is recomputed so a discarded slot stops pinning anything.

use std::sync::Arc;

use super::data::{SlotInfo, SlotKind, SlotPersistency};
use super::registry::{SlotEntry, SlotRegistry};
use crate::errors::SlotResult;
use crate::horizon::HorizonCoordinator;
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::types::{Lsn, ProcessId, TransactionId};

pub struct SlotHandle<'a> {
    registry: &'a SlotRegistry,
    horizon: &'a HorizonCoordinator,
    metrics: &'a MetricsRegistry,
    entry: Arc<SlotEntry>,
    name: String,
    owner: ProcessId,
    finished: bool,
}

impl<'a> SlotHandle<'a> {
    pub(crate) fn new(
        registry: &'a SlotRegistry,
        horizon: &'a HorizonCoordinator,
        metrics: &'a MetricsRegistry,
        entry: Arc<SlotEntry>,
        owner: ProcessId,
    ) -> Self {
        let name = entry.name();
        Self {
            registry,
            horizon,
            metrics,
            entry,
            name,
            owner,
            finished: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> ProcessId {
        self.owner
    }

    pub fn info(&self) -> SlotInfo {
        self.entry.info()
    }

    pub fn kind(&self) -> SlotKind {
        self.entry.lock().data.kind
    }

    pub fn database(&self) -> String {
        self.entry.lock().data.database.clone()
    }

    pub fn persistency(&self) -> SlotPersistency {
        self.entry.persistency()
    }

    pub fn confirmed_flush(&self) -> Lsn {
        self.entry.lock().data.confirmed_flush
    }

    /// Overwrite the slot's read and acknowledge positions with `lsn`.
    ///
    /// This may move an existing position backwards; the caller vouches
    /// that WAL from `lsn` onward is still available.
    pub fn set_anchor(&self, lsn: Lsn) {
        {
            let mut state = self.entry.lock();
            state.data.restart_lsn = lsn;
            state.data.confirmed_flush = lsn;
        }
        log_event_with_fields(
            Event::SlotAnchored,
            &[("slot", &self.name), ("lsn", &lsn.to_string())],
        );
    }

    pub fn set_plugin(&self, plugin: &str) {
        self.entry.lock().data.plugin = plugin.to_string();
    }

    pub fn set_confirmed_flush(&self, lsn: Lsn) {
        self.entry.lock().data.confirmed_flush = lsn;
    }

    /// Pin the oldest catalog horizon decoding from this slot may need.
    ///
    /// The estimate is read, pinned and published under the coordinator
    /// lock, so no concurrent recompute can advance past it in between.
    /// A full snapshot additionally holds back the data horizon, but only
    /// until the slot is released.
    pub fn reserve_catalog_horizon(&self, need_full_snapshot: bool) -> TransactionId {
        let entry = &self.entry;
        let horizon = self.horizon.reserve(need_full_snapshot, self.registry, |xid| {
            let mut state = entry.lock();
            state.data.catalog_xmin = xid;
            state.effective_catalog_xmin = xid;
            if need_full_snapshot {
                state.effective_xmin = xid;
            }
        });

        log_event_with_fields(
            Event::HorizonPinned,
            &[("slot", &self.name), ("catalog_xmin", &horizon.to_string())],
        );
        horizon
    }

    pub fn mark_dirty(&self) {
        self.registry.mark_dirty(&self.entry);
    }

    pub fn save(&self) -> SlotResult<()> {
        if self.registry.save(&self.entry)? {
            self.metrics.increment_slot_saves();
        }
        Ok(())
    }

    /// Promote the slot to persistent.
    pub fn persist(&self) -> SlotResult<()> {
        if self.registry.persist(&self.entry)? {
            self.metrics.increment_slot_saves();
        }
        log_event_with_fields(Event::SlotPersisted, &[("slot", &self.name)]);
        Ok(())
    }

    /// Give up the claim. An ephemeral slot cannot outlive its creator's
    /// claim and is discarded instead; a temporary one stays with the
    /// session.
    pub fn release(mut self) {
        self.finish();
    }

    /// Drop the slot entirely.
    pub fn drop_slot(mut self) -> SlotResult<()> {
        self.finished = true;
        let result = self.registry.drop_acquired(&self.entry, self.owner);
        if result.is_err() {
            self.registry.release(&self.entry, self.owner);
        }
        self.horizon.recompute_required_minimum(self.registry);
        result?;

        self.metrics.increment_slots_dropped();
        log_event_with_fields(Event::SlotDropped, &[("slot", &self.name)]);
        Ok(())
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        if self.persistency() == SlotPersistency::Ephemeral {
            self.discard();
        } else {
            self.release_claim();
        }
    }

    fn release_claim(&mut self) {
        self.registry.release(&self.entry, self.owner);
        self.horizon.recompute_required_minimum(self.registry);
        log_event_with_fields(Event::SlotReleased, &[("slot", &self.name)]);
    }

    fn discard(&mut self) {
        let persistency = self.persistency();
        if let Err(e) = self.registry.drop_acquired(&self.entry, self.owner) {
            // Disk state stays behind marked ephemeral; restore removes it.
            self.metrics.increment_state_unknown();
            log_event_with_fields(
                Event::SlotStateUnknown,
                &[("slot", &self.name), ("reason", &e.to_string())],
            );
            self.registry.release(&self.entry, self.owner);
        }
        self.horizon.recompute_required_minimum(self.registry);

        self.metrics.increment_slots_discarded();
        log_event_with_fields(
            Event::SlotDiscarded,
            &[("slot", &self.name), ("persistency", persistency.as_str())],
        );
    }
}

impl Drop for SlotHandle<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // Unfinished handle: creation failed before release.
        self.finished = true;
        match self.persistency() {
            SlotPersistency::Ephemeral | SlotPersistency::Temporary => self.discard(),
            SlotPersistency::Persistent => self.release_claim(),
        }
    }
}
