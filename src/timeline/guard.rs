//! Timeline Guard
//!
//! Rejects anchors that already lie on the live timeline. Ordinary slot
//! creation covers that case; an anchor there usually means a stale
//! switchover script. The check is advisory: `force` skips it for
//! operators who have verified the anchor, e.g. when re-creating a slot
//! after a failed switchover.

use crate::errors::{SlotError, SlotResult};
use crate::observability::{log_event_with_fields, Event};
use crate::types::{Lsn, TimelineId};

use super::history::TimelineHistory;
use super::provider::TimelineHistoryProvider;

/// Outcome of a guard check that did not reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// The anchor lies on an ancestor timeline
    Passed { containing: TimelineId },
    /// The check was skipped by request
    Overridden,
}

/// The advisory anchor check.
pub struct TimelineGuard;

impl TimelineGuard {
    /// Classifies `target` against `history`.
    pub fn check(target: Lsn, history: &TimelineHistory) -> SlotResult<TimelineId> {
        let current = history.current_timeline();
        let containing = history.timeline_containing(target).ok_or_else(|| {
            SlotError::TimelineHistory(format!(
                "timeline history was not contiguous around {}",
                target
            ))
        })?;

        if containing == current {
            return Err(SlotError::TimelineConflict {
                timeline: current,
                lsn: target,
            });
        }

        Ok(containing)
    }

    /// Runs the check unless `force` is set.
    ///
    /// The history is only read when the check actually runs.
    pub fn guard(
        target: Lsn,
        provider: &dyn TimelineHistoryProvider,
        force: bool,
    ) -> SlotResult<GuardDecision> {
        if force {
            let target_str = target.to_string();
            let current = provider.current_timeline().to_string();
            log_event_with_fields(
                Event::TimelineGuardOverridden,
                &[("lsn", target_str.as_str()), ("timeline", current.as_str())],
            );
            return Ok(GuardDecision::Overridden);
        }

        let history = provider.read_history()?;
        match Self::check(target, &history) {
            Ok(containing) => Ok(GuardDecision::Passed { containing }),
            Err(e) => {
                if let SlotError::TimelineConflict { timeline, lsn } = &e {
                    let timeline = timeline.to_string();
                    let lsn = lsn.to_string();
                    log_event_with_fields(
                        Event::TimelineConflict,
                        &[("lsn", lsn.as_str()), ("timeline", timeline.as_str())],
                    );
                }
                Err(e)
            }
        }
    }
}
