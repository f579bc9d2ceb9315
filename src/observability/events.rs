//! Observable events emitted by slot creation and the slot registry.
//!
//! Events are explicit and typed; their string form is the `event` key of
//! the JSON log line.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration loaded
    ConfigLoaded,

    // Registry
    /// Persistent slot restored from disk
    SlotRestored,
    /// Leftover ephemeral slot state discarded during restore
    SlotRestoreDiscarded,

    // Creation pipeline
    /// Caller rejected by the authorization gate
    PermissionDenied,
    /// Timeline guard skipped by explicit override
    TimelineGuardOverridden,
    /// Anchor rejected by the timeline guard
    TimelineConflict,
    /// Slot entry allocated (ephemeral or temporary)
    SlotAllocated,
    /// Slot position overwritten with the caller's anchor
    SlotAnchored,
    /// Catalog horizon pinned for a slot
    HorizonPinned,
    /// Consistent decoding start point located
    StartpointFound,
    /// Slot state flushed to disk
    SlotSaved,
    /// Slot promoted to persistent
    SlotPersisted,
    /// Acquired slot released to other processes
    SlotReleased,
    /// Uncommitted slot discarded during unwind
    SlotDiscarded,
    /// Persist failed, durable state must be verified
    SlotStateUnknown,

    // Management
    /// Slot dropped by request
    SlotDropped,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::SlotRestored => "SLOT_RESTORED",
            Event::SlotRestoreDiscarded => "SLOT_RESTORE_DISCARDED",

            Event::PermissionDenied => "SLOT_PERMISSION_DENIED",
            Event::TimelineGuardOverridden => "TIMELINE_GUARD_OVERRIDDEN",
            Event::TimelineConflict => "TIMELINE_CONFLICT",
            Event::SlotAllocated => "SLOT_ALLOCATED",
            Event::SlotAnchored => "SLOT_ANCHORED",
            Event::HorizonPinned => "HORIZON_PINNED",
            Event::StartpointFound => "STARTPOINT_FOUND",
            Event::SlotSaved => "SLOT_SAVED",
            Event::SlotPersisted => "SLOT_PERSISTED",
            Event::SlotReleased => "SLOT_RELEASED",
            Event::SlotDiscarded => "SLOT_DISCARDED",
            Event::SlotStateUnknown => "SLOT_STATE_UNKNOWN",

            Event::SlotDropped => "SLOT_DROPPED",
        }
    }

    /// Returns true if this event needs operator attention
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Event::TimelineGuardOverridden
                | Event::SlotRestoreDiscarded
                | Event::SlotDiscarded
                | Event::PermissionDenied
                | Event::TimelineConflict
        )
    }

    /// Returns true if this event leaves state that must be verified manually
    pub fn is_error(&self) -> bool {
        matches!(self, Event::SlotStateUnknown)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
