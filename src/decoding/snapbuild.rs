//! Snapshot builder
//!
//! Decides where decoding can start. A start point is consistent once
//! every transaction that was already running when the scan began has
//! finished, because only then is the full change set of each later
//! transaction visible in the scanned WAL.

use std::collections::BTreeSet;

use super::reader::{WalRecord, WalRecordKind};
use crate::observability::Logger;
use crate::types::{Lsn, TransactionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapBuildState {
    /// No running-transactions record seen yet
    Start,
    /// Waiting for the transactions of the first such record to finish
    BuildingSnapshot,
    /// Decoding may start after `consistent_at`
    Consistent,
}

#[derive(Debug)]
pub struct SnapshotBuilder {
    state: SnapBuildState,
    /// Running-transactions records older than this predate the slot's
    /// catalog horizon and cannot be trusted
    initial_xmin_horizon: TransactionId,
    waiting: BTreeSet<TransactionId>,
    consistent_at: Option<Lsn>,
}

impl SnapshotBuilder {
    pub fn new(initial_xmin_horizon: TransactionId) -> Self {
        Self {
            state: SnapBuildState::Start,
            initial_xmin_horizon,
            waiting: BTreeSet::new(),
            consistent_at: None,
        }
    }

    pub fn state(&self) -> SnapBuildState {
        self.state
    }

    /// End of the record at which the builder became consistent.
    pub fn consistent_at(&self) -> Option<Lsn> {
        self.consistent_at
    }

    /// Feed one record; returns the resulting state.
    pub fn process(&mut self, record: &WalRecord) -> SnapBuildState {
        if self.state == SnapBuildState::Consistent {
            return self.state;
        }

        match &record.kind {
            WalRecordKind::RunningXacts {
                oldest_running,
                xids,
                ..
            } => self.process_running_xacts(record, *oldest_running, xids),
            WalRecordKind::Commit { xid } | WalRecordKind::Abort { xid } => {
                if self.state == SnapBuildState::BuildingSnapshot {
                    self.waiting.remove(xid);
                    self.become_consistent_if_done(record.end);
                }
            }
            WalRecordKind::Other => {}
        }

        self.state
    }

    fn process_running_xacts(
        &mut self,
        record: &WalRecord,
        oldest_running: TransactionId,
        xids: &[TransactionId],
    ) {
        match self.state {
            SnapBuildState::Start => {
                if self.initial_xmin_horizon.is_valid()
                    && oldest_running.is_valid()
                    && oldest_running < self.initial_xmin_horizon
                {
                    Logger::trace(
                        "SNAPBUILD_SKIP_RUNNING_XACTS",
                        &[
                            ("lsn", &record.lsn.to_string()),
                            ("oldest_running", &oldest_running.to_string()),
                            ("initial_xmin_horizon", &self.initial_xmin_horizon.to_string()),
                        ],
                    );
                    return;
                }
                self.waiting = xids.iter().copied().collect();
                self.state = SnapBuildState::BuildingSnapshot;
                self.become_consistent_if_done(record.end);
            }
            SnapBuildState::BuildingSnapshot => {
                // Anything older than the oldest running xid has finished
                self.waiting.retain(|xid| *xid >= oldest_running);
                self.become_consistent_if_done(record.end);
            }
            SnapBuildState::Consistent => {}
        }
    }

    fn become_consistent_if_done(&mut self, end: Lsn) {
        if self.waiting.is_empty() {
            self.state = SnapBuildState::Consistent;
            self.consistent_at = Some(end);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xid(v: u32) -> TransactionId {
        TransactionId::new(v)
    }

    fn record(offset: u32, kind: WalRecordKind) -> WalRecord {
        WalRecord {
            lsn: Lsn::from_parts(0x10, offset),
            end: Lsn::from_parts(0x10, offset + 0x40),
            kind,
        }
    }

    fn running(oldest: u32, xids: &[u32]) -> WalRecordKind {
        WalRecordKind::RunningXacts {
            next_xid: xid(xids.iter().copied().max().unwrap_or(oldest) + 1),
            oldest_running: xid(oldest),
            xids: xids.iter().copied().map(xid).collect(),
        }
    }

    #[test]
    fn test_idle_running_xacts_is_consistent_immediately() {
        let mut builder = SnapshotBuilder::new(xid(5));
        assert_eq!(builder.process(&record(0, WalRecordKind::Other)), SnapBuildState::Start);
        assert_eq!(builder.process(&record(0x40, running(10, &[]))), SnapBuildState::Consistent);
        assert_eq!(builder.consistent_at(), Some(Lsn::from_parts(0x10, 0x80)));
    }

    #[test]
    fn test_waits_for_running_transactions() {
        let mut builder = SnapshotBuilder::new(xid(5));
        builder.process(&record(0, running(10, &[10, 11])));
        assert_eq!(builder.state(), SnapBuildState::BuildingSnapshot);

        builder.process(&record(0x40, WalRecordKind::Commit { xid: xid(10) }));
        assert_eq!(builder.state(), SnapBuildState::BuildingSnapshot);

        builder.process(&record(0x80, WalRecordKind::Abort { xid: xid(11) }));
        assert_eq!(builder.state(), SnapBuildState::Consistent);
        assert_eq!(builder.consistent_at(), Some(Lsn::from_parts(0x10, 0xC0)));
    }

    #[test]
    fn test_later_running_xacts_retires_old_xids() {
        let mut builder = SnapshotBuilder::new(xid(5));
        builder.process(&record(0, running(10, &[10])));
        builder.process(&record(0x40, running(12, &[12])));
        assert_eq!(builder.state(), SnapBuildState::Consistent);
    }

    #[test]
    fn test_records_before_horizon_are_skipped() {
        let mut builder = SnapshotBuilder::new(xid(20));
        builder.process(&record(0, running(10, &[])));
        assert_eq!(builder.state(), SnapBuildState::Start);

        builder.process(&record(0x40, running(20, &[])));
        assert_eq!(builder.state(), SnapBuildState::Consistent);
    }

    #[test]
    fn test_commit_before_first_running_xacts_is_ignored() {
        let mut builder = SnapshotBuilder::new(xid(5));
        builder.process(&record(0, WalRecordKind::Commit { xid: xid(7) }));
        assert_eq!(builder.state(), SnapBuildState::Start);
    }
}
