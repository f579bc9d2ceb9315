//! Timeline history
//!
//! A history is the chain of timelines the server descends from. Each
//! segment covers the half-open range `[begin, end)`; the oldest segment
//! has no lower bound and the current one has no upper bound.
//!
//! History files list one line per ancestor timeline:
//!
//! ```text
//! 1	0/3000000	no recovery target specified
//! 2	0/5000000	before 2000-01-01 00:00:00+00
//! ```
//!
//! The second column is the position at which the *next* timeline
//! branched off. Blank lines and `#` comments are ignored.

use crate::errors::{SlotError, SlotResult};
use crate::types::{Lsn, TimelineId};

/// One timeline's range in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineSegment {
    pub timeline: TimelineId,
    /// First position on this timeline; `Lsn::INVALID` means unbounded
    pub begin: Lsn,
    /// Switch point to the next timeline; `Lsn::INVALID` means still open
    pub end: Lsn,
}

impl TimelineSegment {
    /// Returns true if `lsn` falls inside this segment
    pub fn contains(&self, lsn: Lsn) -> bool {
        (!self.begin.is_valid() || self.begin <= lsn) && (!self.end.is_valid() || lsn < self.end)
    }
}

/// Immutable, oldest-first timeline history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineHistory {
    segments: Vec<TimelineSegment>,
}

impl TimelineHistory {
    /// History of a server that has never been promoted.
    pub fn single(current: TimelineId) -> Self {
        Self {
            segments: vec![TimelineSegment {
                timeline: current,
                begin: Lsn::INVALID,
                end: Lsn::INVALID,
            }],
        }
    }

    /// Builds a history from ancestor switch points.
    ///
    /// `switchpoints` lists `(ancestor timeline, position where its child
    /// begins)` in increasing timeline order.
    pub fn from_switchpoints(
        current: TimelineId,
        switchpoints: &[(TimelineId, Lsn)],
    ) -> SlotResult<Self> {
        let mut segments = Vec::with_capacity(switchpoints.len() + 1);
        let mut prev_end = Lsn::INVALID;
        let mut last_tli: Option<TimelineId> = None;

        for &(timeline, switchpoint) in switchpoints {
            if let Some(last) = last_tli {
                if timeline <= last {
                    return Err(SlotError::TimelineHistory(
                        "timeline IDs must be in increasing sequence".to_string(),
                    ));
                }
            }
            if prev_end.is_valid() && switchpoint < prev_end {
                return Err(SlotError::TimelineHistory(format!(
                    "switch point {} precedes previous switch point {}",
                    switchpoint, prev_end
                )));
            }
            segments.push(TimelineSegment {
                timeline,
                begin: prev_end,
                end: switchpoint,
            });
            prev_end = switchpoint;
            last_tli = Some(timeline);
        }

        if let Some(last) = last_tli {
            if current <= last {
                return Err(SlotError::TimelineHistory(format!(
                    "timeline IDs must be less than child timeline's ID {}",
                    current
                )));
            }
        }

        segments.push(TimelineSegment {
            timeline: current,
            begin: prev_end,
            end: Lsn::INVALID,
        });

        Ok(Self { segments })
    }

    /// Parses the contents of the history file belonging to `current`.
    pub fn parse(current: TimelineId, content: &str) -> SlotResult<Self> {
        let mut switchpoints = Vec::new();

        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split_whitespace();
            let (tli, lsn) = match (fields.next(), fields.next()) {
                (Some(tli), Some(lsn)) => (tli, lsn),
                _ => {
                    return Err(SlotError::TimelineHistory(format!(
                        "syntax error in history file at line {}: \
                         expected a transaction log switchpoint location",
                        lineno + 1
                    )))
                }
            };

            let tli: u32 = tli.parse().map_err(|_| {
                SlotError::TimelineHistory(format!(
                    "syntax error in history file at line {}: expected a numeric timeline ID",
                    lineno + 1
                ))
            })?;
            let lsn: Lsn = lsn.parse().map_err(|e| {
                SlotError::TimelineHistory(format!(
                    "syntax error in history file at line {}: {}",
                    lineno + 1,
                    e
                ))
            })?;

            switchpoints.push((TimelineId::new(tli), lsn));
        }

        Self::from_switchpoints(current, &switchpoints)
    }

    /// The timeline the server is currently on.
    pub fn current_timeline(&self) -> TimelineId {
        // Constructors always push the current segment last.
        self.segments[self.segments.len() - 1].timeline
    }

    /// Position at which the current timeline began.
    pub fn current_begin(&self) -> Lsn {
        self.segments[self.segments.len() - 1].begin
    }

    /// Segments, oldest first.
    pub fn segments(&self) -> &[TimelineSegment] {
        &self.segments
    }

    /// Timeline whose range brackets `lsn`.
    ///
    /// Returns `None` only if the history has gaps, which no constructor
    /// here produces.
    pub fn timeline_containing(&self, lsn: Lsn) -> Option<TimelineId> {
        self.segments
            .iter()
            .rev()
            .find(|seg| seg.contains(lsn))
            .map(|seg| seg.timeline)
    }
}
