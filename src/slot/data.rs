//! Slot data model
//!
//! `SlotPersistentData` is what reaches disk. `SlotState` adds the
//! in-memory fields: the effective horizons the aggregate reads, the
//! owning process and the dirty flag.

use serde::{Deserialize, Serialize};

use crate::errors::{SlotError, SlotResult};
use crate::types::{Lsn, ProcessId, TransactionId};

/// Longest slot name accepted.
pub const MAX_SLOT_NAME_LEN: usize = 63;

/// Physical or logical slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Physical,
    Logical,
}

/// Lifecycle state of a slot.
///
/// - Ephemeral: visible only to its creator, discarded on any failure
///   and on restart
/// - Temporary: lives as long as the owning session, never on disk
/// - Persistent: survives restart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotPersistency {
    Ephemeral,
    Temporary,
    Persistent,
}

impl SlotPersistency {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotPersistency::Ephemeral => "ephemeral",
            SlotPersistency::Temporary => "temporary",
            SlotPersistency::Persistent => "persistent",
        }
    }

    /// Returns true if this state vanishes when its creator fails.
    pub fn is_uncommitted(&self) -> bool {
        matches!(self, SlotPersistency::Ephemeral | SlotPersistency::Temporary)
    }
}

/// Durable part of a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotPersistentData {
    pub name: String,
    pub kind: SlotKind,
    /// Database a logical slot decodes; empty for physical slots
    pub database: String,
    /// Output plugin; empty until decoding is initialized
    pub plugin: String,
    pub persistency: SlotPersistency,
    pub restart_lsn: Lsn,
    pub confirmed_flush: Lsn,
    pub xmin: TransactionId,
    pub catalog_xmin: TransactionId,
}

impl SlotPersistentData {
    pub fn new(
        name: impl Into<String>,
        kind: SlotKind,
        database: impl Into<String>,
        persistency: SlotPersistency,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            database: database.into(),
            plugin: String::new(),
            persistency,
            restart_lsn: Lsn::INVALID,
            confirmed_flush: Lsn::INVALID,
            xmin: TransactionId::INVALID,
            catalog_xmin: TransactionId::INVALID,
        }
    }
}

/// In-memory slot state, guarded by the slot's own lock.
#[derive(Debug, Clone)]
pub struct SlotState {
    pub data: SlotPersistentData,
    /// Data horizon the aggregate uses; may differ from `data.xmin`
    pub effective_xmin: TransactionId,
    /// Catalog horizon the aggregate uses
    pub effective_catalog_xmin: TransactionId,
    /// Process currently owning the slot
    pub active_pid: Option<ProcessId>,
    /// In-memory data differs from what is on disk
    pub dirty: bool,
}

impl SlotState {
    pub fn new(data: SlotPersistentData, owner: Option<ProcessId>) -> Self {
        Self {
            effective_xmin: data.xmin,
            effective_catalog_xmin: data.catalog_xmin,
            data,
            active_pid: owner,
            dirty: false,
        }
    }

    pub fn info(&self) -> SlotInfo {
        SlotInfo {
            slot_name: self.data.name.clone(),
            plugin: self.data.plugin.clone(),
            slot_type: self.data.kind,
            database: self.data.database.clone(),
            persistency: self.data.persistency,
            active_pid: self.active_pid.map(|p| p.value()),
            xmin: self.data.xmin,
            catalog_xmin: self.data.catalog_xmin,
            restart_lsn: self.data.restart_lsn,
            confirmed_flush_lsn: self.data.confirmed_flush,
        }
    }
}

/// Read-only view of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotInfo {
    pub slot_name: String,
    pub plugin: String,
    pub slot_type: SlotKind,
    pub database: String,
    pub persistency: SlotPersistency,
    pub active_pid: Option<u32>,
    pub xmin: TransactionId,
    pub catalog_xmin: TransactionId,
    pub restart_lsn: Lsn,
    pub confirmed_flush_lsn: Lsn,
}

/// Slot names are 1-63 characters of lower-case letters, digits and
/// underscores; they double as directory names.
pub fn validate_slot_name(name: &str) -> SlotResult<()> {
    let invalid = |reason| SlotError::InvalidName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("name is too short"));
    }
    if name.len() > MAX_SLOT_NAME_LEN {
        return Err(invalid("name is too long"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(invalid(
            "names may only contain lower case letters, numbers, and the underscore character",
        ));
    }
    Ok(())
}
