//! Creation request

use serde::{Deserialize, Serialize};

use crate::types::Lsn;

/// Arguments of one anchored creation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAnchoredSlot {
    pub slot_name: String,
    pub plugin: String,
    /// Drop the slot when the session ends instead of persisting it
    #[serde(default)]
    pub temporary: bool,
    /// Position the slot starts reading from.
    ///
    /// Must be a valid position: `0/0` is rejected with `InvalidAnchor`
    /// rather than resolved to the current WAL insert position.
    pub anchor_lsn: Lsn,
    /// Skip the timeline guard
    #[serde(default)]
    pub force: bool,
}

impl CreateAnchoredSlot {
    pub fn new(slot_name: impl Into<String>, plugin: impl Into<String>, anchor_lsn: Lsn) -> Self {
        Self {
            slot_name: slot_name.into(),
            plugin: plugin.into(),
            temporary: false,
            anchor_lsn,
            force: false,
        }
    }

    pub fn temporary(mut self) -> Self {
        self.temporary = true;
        self
    }

    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }
}
