//! Crash point injection for durability testing
//!
//! Crash points are enabled through the `SLOTANCHOR_CRASH_POINT`
//! environment variable. When the named point is reached the process
//! terminates via `std::process::abort()`: no cleanup, no unwinding,
//! no destructors. A restart must then find either no trace of the slot
//! or a fully persisted one.
//!
//! ```bash
//! SLOTANCHOR_CRASH_POINT=slot_after_anchor slotanchor create ...
//! ```

use std::sync::OnceLock;

static CRASH_POINT: OnceLock<Option<String>> = OnceLock::new();

#[inline]
fn get_crash_point() -> Option<&'static str> {
    CRASH_POINT
        .get_or_init(|| std::env::var("SLOTANCHOR_CRASH_POINT").ok())
        .as_deref()
}

/// Check if a specific crash point is enabled
#[inline]
pub fn crash_point_enabled(name: &str) -> bool {
    get_crash_point().map(|p| p == name).unwrap_or(false)
}

/// Abort the process if the named crash point is enabled
#[inline]
pub fn maybe_crash(name: &str) {
    if crash_point_enabled(name) {
        eprintln!("[CRASH] Triggering crash at point: {}", name);
        std::process::abort();
    }
}

/// All defined crash point names
pub mod points {
    /// Slot entry allocated, state file written as ephemeral
    pub const SLOT_AFTER_ALLOCATE: &str = "slot_after_allocate";
    /// Anchor written into the in-memory slot
    pub const SLOT_AFTER_ANCHOR: &str = "slot_after_anchor";
    /// Horizon published, nothing saved yet
    pub const SLOT_AFTER_HORIZON: &str = "slot_after_horizon";
    /// State temp file fsynced, not yet renamed into place
    pub const SLOT_STATE_BEFORE_RENAME: &str = "slot_state_before_rename";
    /// Ephemeral state saved, persist not yet started
    pub const SLOT_BEFORE_PERSIST: &str = "slot_before_persist";
    /// Persistent state saved, ownership not yet released
    pub const SLOT_AFTER_PERSIST: &str = "slot_after_persist";
    /// Slot directory removed during drop, registry entry still present
    pub const SLOT_DROP_AFTER_REMOVE: &str = "slot_drop_after_remove";

    /// Get all crash point names
    pub fn all() -> &'static [&'static str] {
        &[
            SLOT_AFTER_ALLOCATE,
            SLOT_AFTER_ANCHOR,
            SLOT_AFTER_HORIZON,
            SLOT_STATE_BEFORE_RENAME,
            SLOT_BEFORE_PERSIST,
            SLOT_AFTER_PERSIST,
            SLOT_DROP_AFTER_REMOVE,
        ]
    }
}
