//! Timeline subsystem
//!
//! Classifies a log position against the server's timeline history so
//! that anchors already covered by the live timeline can be rejected
//! before any slot state is touched.
//!
//! This module provides:
//! - `TimelineHistory` - Ordered timeline segments, oldest first
//! - `TimelineHistoryProvider` - Source of the current history
//! - `TimelineGuard` - The advisory anchor check

mod guard;
mod history;
mod provider;

pub use guard::{GuardDecision, TimelineGuard};
pub use history::{TimelineHistory, TimelineSegment};
pub use provider::{history_file_name, FileHistoryProvider, TimelineHistoryProvider};
