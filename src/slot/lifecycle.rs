//! Slot lifecycle manager
//!
//! Drives a slot from allocation to release:
//!
//! ```text
//! allocate (ephemeral | temporary)
//!     -> anchor -> decoding bootstrap (validate, pin horizon, save)
//!     -> persist (non-temporary) -> release
//! ```
//!
//! Until `persist` succeeds the slot is discarded on any error, together
//! with its state file and its horizon contribution.

use std::sync::Arc;

use serde::Serialize;

use super::data::{SlotInfo, SlotKind, SlotPersistency};
use super::handle::SlotHandle;
use super::registry::{SlotEntry, SlotRegistry};
use crate::crash_point::{maybe_crash, points};
use crate::decoding::{BootstrapOptions, DecodingBootstrap, WalReader};
use crate::errors::SlotResult;
use crate::horizon::HorizonCoordinator;
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::session::Session;
use crate::types::Lsn;

/// Whether a new slot should outlive the creating session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotDurability {
    Persistent,
    Temporary,
}

impl SlotDurability {
    fn initial_persistency(&self) -> SlotPersistency {
        match self {
            SlotDurability::Persistent => SlotPersistency::Ephemeral,
            SlotDurability::Temporary => SlotPersistency::Temporary,
        }
    }
}

/// Outcome of a successful creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnchoredSlot {
    pub slot_name: String,
    pub confirmed_flush: Lsn,
}

pub struct SlotLifecycleManager {
    registry: Arc<SlotRegistry>,
    horizon: Arc<HorizonCoordinator>,
    metrics: Arc<MetricsRegistry>,
    bootstrap: DecodingBootstrap,
}

impl SlotLifecycleManager {
    pub fn new(
        registry: Arc<SlotRegistry>,
        horizon: Arc<HorizonCoordinator>,
        metrics: Arc<MetricsRegistry>,
        bootstrap: DecodingBootstrap,
    ) -> Self {
        Self {
            registry,
            horizon,
            metrics,
            bootstrap,
        }
    }

    pub fn registry(&self) -> &Arc<SlotRegistry> {
        &self.registry
    }

    pub fn horizon(&self) -> &Arc<HorizonCoordinator> {
        &self.horizon
    }

    pub fn bootstrap(&self) -> &DecodingBootstrap {
        &self.bootstrap
    }

    fn handle(&self, entry: Arc<SlotEntry>, session: &Session) -> SlotHandle<'_> {
        SlotHandle::new(&self.registry, &self.horizon, &self.metrics, entry, session.pid())
    }

    /// Create a logical slot positioned at `anchor`.
    ///
    /// The caller is responsible for authorization and for checking the
    /// anchor against timeline history.
    #[allow(clippy::too_many_arguments)]
    pub fn create_anchored(
        &self,
        session: &Session,
        name: &str,
        plugin: &str,
        durability: SlotDurability,
        anchor: Lsn,
        options: BootstrapOptions,
        reader: Option<&mut dyn WalReader>,
    ) -> SlotResult<AnchoredSlot> {
        let entry = self.registry.create(
            name,
            SlotKind::Logical,
            session.database(),
            durability.initial_persistency(),
            session.pid(),
        )?;
        let handle = self.handle(entry, session);
        log_event_with_fields(
            Event::SlotAllocated,
            &[
                ("slot", name),
                ("persistency", durability.initial_persistency().as_str()),
            ],
        );
        maybe_crash(points::SLOT_AFTER_ALLOCATE);

        handle.set_anchor(anchor);
        maybe_crash(points::SLOT_AFTER_ANCHOR);

        let ctx = self
            .bootstrap
            .bootstrap(session, &handle, plugin, anchor, options, reader)?;
        drop(ctx);

        let confirmed_flush = handle.confirmed_flush();

        if durability == SlotDurability::Persistent {
            maybe_crash(points::SLOT_BEFORE_PERSIST);
            handle.persist()?;
            maybe_crash(points::SLOT_AFTER_PERSIST);
        }

        handle.release();
        Ok(AnchoredSlot {
            slot_name: name.to_string(),
            confirmed_flush,
        })
    }

    /// Drop an existing slot that no other process has acquired.
    pub fn drop_slot(&self, session: &Session, name: &str) -> SlotResult<()> {
        let entry = self.registry.acquire(name, session.pid())?;
        self.handle(entry, session).drop_slot()
    }

    pub fn list_slots(&self) -> Vec<SlotInfo> {
        self.registry.list()
    }

    /// Session teardown: drop the session's temporary slots.
    pub fn end_session(&self, session: &Session) -> Vec<String> {
        let dropped = self.registry.cleanup_session(session.pid());
        self.horizon.recompute_required_minimum(self.registry.as_ref());
        for name in &dropped {
            log_event_with_fields(
                Event::SlotDropped,
                &[("slot", name.as_str()), ("reason", "session end")],
            );
        }
        dropped
    }
}
