//! # Slot Errors
//!
//! Error taxonomy for anchored slot creation and the slot registry.
//!
//! Every error is terminal for the call that produced it; nothing is
//! retried internally. Errors raised before a slot is promoted leave no
//! trace. `Io` raised while persisting may leave the slot in an unknown
//! durable state and says so through `is_state_unknown()`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{Lsn, TimelineId};

/// Result type for slot operations
pub type SlotResult<T> = Result<T, SlotError>;

/// Slot creation and management errors
#[derive(Debug, Error)]
pub enum SlotError {
    // ==================
    // Authorization
    // ==================

    /// Caller lacks superuser, replication attribute and delegated role
    #[error(
        "permission denied: role \"{role}\" must be superuser or replication role \
         to use replication slots"
    )]
    PermissionDenied { role: String },

    // ==================
    // Timeline
    // ==================

    /// Anchor lies inside the currently active timeline
    #[error(
        "timeline {timeline} includes slot LSN {lsn}; \
         the slot must be created before switchover"
    )]
    TimelineConflict { timeline: TimelineId, lsn: Lsn },

    /// Anchor is not a usable WAL position
    #[error("invalid slot anchor LSN {0}")]
    InvalidAnchor(Lsn),

    /// Timeline history could not be read or parsed
    #[error("timeline history error: {0}")]
    TimelineHistory(String),

    // ==================
    // Registry
    // ==================

    /// A slot with this name already exists
    #[error("replication slot \"{0}\" already exists")]
    AlreadyExists(String),

    /// Slot name fails validation
    #[error("replication slot name \"{name}\" is invalid: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// All configured slot entries are in use
    #[error("all replication slots are in use (max_replication_slots = {max})")]
    NoFreeSlots { max: usize },

    /// The calling process already has a slot acquired
    #[error("process {pid} already has replication slot \"{slot}\" acquired")]
    SlotAlreadyAcquired { pid: u32, slot: String },

    /// No slot with this name exists
    #[error("replication slot \"{0}\" does not exist")]
    SlotNotFound(String),

    /// Slot is acquired by another process
    #[error("replication slot \"{name}\" is active for PID {pid}")]
    SlotActive { name: String, pid: u32 },

    // ==================
    // Decoding
    // ==================

    /// Output plugin is not registered
    #[error("output plugin \"{0}\" is not registered")]
    InvalidPlugin(String),

    /// Physical slots cannot be used for logical decoding
    #[error("cannot use physical replication slot \"{0}\" for logical decoding")]
    PhysicalSlot(String),

    /// Slot belongs to another database
    #[error("replication slot \"{slot}\" was not created in database \"{database}\"")]
    WrongDatabase { slot: String, database: String },

    /// The enclosing transaction has already written
    #[error("cannot create logical replication slot in transaction that has performed writes")]
    ActiveTransactionHasWrites,

    /// Server settings do not allow logical decoding
    #[error("logical decoding requirements not met: {0}")]
    DecodingRequirements(String),

    /// WAL ran out before a consistent decoding point was found
    #[error("no consistent decoding start point found after {from}")]
    NoConsistentPoint { from: Lsn },

    /// WAL reader failed during the start point search
    #[error("could not read WAL at {lsn}: {source}")]
    WalRead {
        lsn: Lsn,
        #[source]
        source: io::Error,
    },

    // ==================
    // Durability
    // ==================

    /// Persisted slot state failed validation
    #[error("replication slot state corrupted: {0}")]
    Corruption(String),

    /// Another process holds the data directory
    #[error("data directory \"{}\" is locked by another process", path.display())]
    DataDirLocked { path: PathBuf },

    /// Slot state could not be written or removed
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
        state_unknown: bool,
    },
}

impl SlotError {
    /// I/O failure whose outcome is known (nothing became durable)
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        SlotError::Io {
            context: context.into(),
            source,
            state_unknown: false,
        }
    }

    /// I/O failure after which the durable state must be verified manually
    pub fn io_unknown_state(context: impl Into<String>, source: io::Error) -> Self {
        SlotError::Io {
            context: context.into(),
            source,
            state_unknown: true,
        }
    }

    /// Returns the SQLSTATE-style error code
    pub fn code(&self) -> &'static str {
        match self {
            SlotError::PermissionDenied { .. } => "42501",
            SlotError::TimelineConflict { .. } => "XX000",
            SlotError::InvalidAnchor(_) => "22023",
            SlotError::TimelineHistory(_) => "58P01",
            SlotError::AlreadyExists(_) => "42710",
            SlotError::InvalidName { .. } => "42602",
            SlotError::NoFreeSlots { .. } => "53400",
            SlotError::SlotAlreadyAcquired { .. } => "55006",
            SlotError::SlotNotFound(_) => "42704",
            SlotError::SlotActive { .. } => "55006",
            SlotError::InvalidPlugin(_) => "42704",
            SlotError::PhysicalSlot(_) => "55000",
            SlotError::WrongDatabase { .. } => "55000",
            SlotError::ActiveTransactionHasWrites => "25001",
            SlotError::DecodingRequirements(_) => "55000",
            SlotError::NoConsistentPoint { .. } => "55000",
            SlotError::WalRead { .. } => "58030",
            SlotError::Corruption(_) => "XX001",
            SlotError::DataDirLocked { .. } => "55006",
            SlotError::Io { .. } => "58030",
        }
    }

    /// Returns true when the failure may have left durable state behind
    pub fn is_state_unknown(&self) -> bool {
        matches!(
            self,
            SlotError::Io {
                state_unknown: true,
                ..
            }
        )
    }
}
