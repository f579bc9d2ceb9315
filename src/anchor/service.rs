//! Anchored slot creation service
//!
//! Runs the full creation pipeline:
//!
//! ```text
//! authorize -> timeline guard -> decoding requirements -> lifecycle
//! ```
//!
//! Each stage can abort. The first two stages and the requirements
//! check touch nothing; from allocation on, failures unwind through the
//! slot handle and leave no trace.

use std::sync::Arc;

use super::request::CreateAnchoredSlot;
use super::requirements::DecodingRequirements;
use crate::auth::{AuthorizationGate, RoleProvider};
use crate::config::ServerConfig;
use crate::decoding::{BootstrapOptions, DecodingBootstrap, WalReader};
use crate::errors::{SlotError, SlotResult};
use crate::horizon::HorizonCoordinator;
use crate::observability::{
    log_event_with_fields, Event, MetricsRegistry, MetricsSnapshot, ObservationScope,
};
use crate::session::Session;
use crate::slot::{AnchoredSlot, SlotDurability, SlotInfo, SlotLifecycleManager, SlotRegistry};
use crate::timeline::{FileHistoryProvider, GuardDecision, TimelineGuard, TimelineHistoryProvider};
use crate::types::TransactionId;

pub struct SlotAnchorService {
    gate: AuthorizationGate,
    roles: Arc<dyn RoleProvider>,
    timelines: Arc<dyn TimelineHistoryProvider>,
    requirements: DecodingRequirements,
    lifecycle: SlotLifecycleManager,
    metrics: Arc<MetricsRegistry>,
}

impl SlotAnchorService {
    pub fn new(
        gate: AuthorizationGate,
        roles: Arc<dyn RoleProvider>,
        timelines: Arc<dyn TimelineHistoryProvider>,
        requirements: DecodingRequirements,
        lifecycle: SlotLifecycleManager,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            gate,
            roles,
            timelines,
            requirements,
            lifecycle,
            metrics,
        }
    }

    /// Open the service described by `config`: restore the registry from
    /// disk and publish the restored slots' horizons.
    ///
    /// The data directory stays locked until the service is dropped; a
    /// second open of the same directory waits for that.
    pub fn open(config: &ServerConfig) -> SlotResult<Self> {
        let registry = SlotRegistry::open(config.data_path(), config.max_replication_slots)?;
        let registry = Arc::new(registry);
        let horizon = Arc::new(HorizonCoordinator::new(TransactionId::new(config.next_xid)));
        horizon.recompute_required_minimum(registry.as_ref());

        let metrics = Arc::new(MetricsRegistry::new());
        let lifecycle = SlotLifecycleManager::new(
            registry,
            horizon,
            Arc::clone(&metrics),
            DecodingBootstrap::new(config.plugin_registry()),
        );

        Ok(Self::new(
            config.gate(),
            Arc::new(config.role_catalog()),
            Arc::new(FileHistoryProvider::new(config.history_dir(), config.timeline())),
            config.requirements(),
            lifecycle,
            metrics,
        ))
    }

    pub fn lifecycle(&self) -> &SlotLifecycleManager {
        &self.lifecycle
    }

    pub fn registry(&self) -> &Arc<SlotRegistry> {
        self.lifecycle.registry()
    }

    pub fn horizon(&self) -> &Arc<HorizonCoordinator> {
        self.lifecycle.horizon()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Create a logical slot at `request.anchor_lsn`.
    ///
    /// Returns the slot name and its `confirmed_flush`, which equals the
    /// anchor.
    pub fn create_logical_replication_slot_lsn(
        &self,
        session: &Session,
        request: &CreateAnchoredSlot,
    ) -> SlotResult<AnchoredSlot> {
        self.create_with_bootstrap(session, request, BootstrapOptions::default(), None)
    }

    /// Like `create_logical_replication_slot_lsn`, with explicit decoding
    /// bootstrap options. A start point search moves `confirmed_flush`
    /// past the anchor to the first consistent point.
    pub fn create_with_bootstrap(
        &self,
        session: &Session,
        request: &CreateAnchoredSlot,
        options: BootstrapOptions,
        reader: Option<&mut dyn WalReader>,
    ) -> SlotResult<AnchoredSlot> {
        let anchor = request.anchor_lsn.to_string();
        let scope = ObservationScope::with_fields(
            "SLOT_CREATE",
            &[
                ("slot", request.slot_name.as_str()),
                ("plugin", request.plugin.as_str()),
                ("lsn", anchor.as_str()),
                ("role", session.identity().role()),
            ],
        );

        match self.create_inner(session, request, options, reader) {
            Ok(created) => {
                self.metrics.increment_slots_created();
                let confirmed = created.confirmed_flush.to_string();
                scope.complete_with_fields(&[("confirmed_flush", confirmed.as_str())]);
                Ok(created)
            }
            Err(e) => {
                self.metrics.increment_creation_failures();
                if e.is_state_unknown() {
                    self.metrics.increment_state_unknown();
                    log_event_with_fields(
                        Event::SlotStateUnknown,
                        &[("slot", request.slot_name.as_str()), ("reason", &e.to_string())],
                    );
                }
                scope.fail(e.code(), &e.to_string());
                Err(e)
            }
        }
    }

    fn create_inner(
        &self,
        session: &Session,
        request: &CreateAnchoredSlot,
        options: BootstrapOptions,
        reader: Option<&mut dyn WalReader>,
    ) -> SlotResult<AnchoredSlot> {
        self.authorize(session)?;

        if !request.anchor_lsn.is_valid() {
            return Err(SlotError::InvalidAnchor(request.anchor_lsn));
        }

        match TimelineGuard::guard(request.anchor_lsn, self.timelines.as_ref(), request.force) {
            Ok(GuardDecision::Overridden) => self.metrics.increment_timeline_overrides(),
            Ok(GuardDecision::Passed { .. }) => {}
            Err(e) => {
                if matches!(e, SlotError::TimelineConflict { .. }) {
                    self.metrics.increment_timeline_conflicts();
                }
                return Err(e);
            }
        }

        self.requirements.check_logical(session)?;

        let durability = if request.temporary {
            SlotDurability::Temporary
        } else {
            SlotDurability::Persistent
        };

        self.lifecycle.create_anchored(
            session,
            &request.slot_name,
            &request.plugin,
            durability,
            request.anchor_lsn,
            options,
            reader,
        )
    }

    fn authorize(&self, session: &Session) -> SlotResult<()> {
        let result = self.gate.authorize(self.roles.as_ref(), session.identity());
        if result.is_err() {
            self.metrics.increment_permission_denials();
            log_event_with_fields(Event::PermissionDenied, &[("role", session.identity().role())]);
        }
        result
    }

    /// Drop a slot no other process is using.
    pub fn drop_replication_slot(&self, session: &Session, name: &str) -> SlotResult<()> {
        self.authorize(session)?;
        self.requirements.check_slots()?;
        self.lifecycle.drop_slot(session, name)
    }

    pub fn list_slots(&self) -> Vec<SlotInfo> {
        self.lifecycle.list_slots()
    }

    /// Release everything `session` still holds and drop its temporary
    /// slots.
    pub fn end_session(&self, session: &Session) -> Vec<String> {
        self.lifecycle.end_session(session)
    }
}
