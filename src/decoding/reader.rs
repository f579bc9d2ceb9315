//! WAL reader seam
//!
//! The start point search sees WAL only as a sequence of decoded
//! records. Readers are driven segment by segment: `segment_open` before
//! the first read inside a segment, `segment_close` when the search moves
//! on or finishes.

use std::io;

use crate::types::{Lsn, TransactionId};

/// Size of one WAL segment file.
pub const WAL_SEGMENT_SIZE: u64 = 16 * 1024 * 1024;

/// The parts of a WAL record the snapshot builder cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecordKind {
    /// Snapshot of the transactions in progress when it was logged
    RunningXacts {
        next_xid: TransactionId,
        oldest_running: TransactionId,
        xids: Vec<TransactionId>,
    },
    Commit {
        xid: TransactionId,
    },
    Abort {
        xid: TransactionId,
    },
    /// Anything else
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    /// Start of the record
    pub lsn: Lsn,
    /// First byte past the record
    pub end: Lsn,
    pub kind: WalRecordKind,
}

/// Source of WAL records.
pub trait WalReader {
    /// Open segment `segno` for reading.
    fn segment_open(&mut self, segno: u64) -> io::Result<()>;

    /// Return the first record starting at or after `at`, or `None` once
    /// no more WAL is available.
    fn read_record(&mut self, at: Lsn) -> io::Result<Option<WalRecord>>;

    /// Close the currently open segment.
    fn segment_close(&mut self);
}

/// In-memory WAL, built record by record.
#[derive(Debug, Clone)]
pub struct MemoryWalReader {
    records: Vec<WalRecord>,
    next_lsn: Lsn,
    fail_at: Option<Lsn>,
    open_segment: Option<u64>,
    opened: Vec<u64>,
    closes: usize,
}

impl MemoryWalReader {
    /// Length given to every appended record.
    pub const RECORD_LEN: u64 = 0x40;

    /// Empty WAL whose first record will start at `start`.
    pub fn new(start: Lsn) -> Self {
        Self {
            records: Vec::new(),
            next_lsn: start,
            fail_at: None,
            open_segment: None,
            opened: Vec::new(),
            closes: 0,
        }
    }

    /// Append a record after the last one.
    pub fn record(mut self, kind: WalRecordKind) -> Self {
        let lsn = self.next_lsn;
        let end = lsn.advance(Self::RECORD_LEN);
        self.records.push(WalRecord { lsn, end, kind });
        self.next_lsn = end;
        self
    }

    /// Skip ahead so the next record starts at `lsn`.
    pub fn gap_to(mut self, lsn: Lsn) -> Self {
        if lsn > self.next_lsn {
            self.next_lsn = lsn;
        }
        self
    }

    /// Make reads at or past `lsn` fail with an I/O error.
    pub fn fail_at(mut self, lsn: Lsn) -> Self {
        self.fail_at = Some(lsn);
        self
    }

    pub fn records(&self) -> &[WalRecord] {
        &self.records
    }

    /// Segments opened so far, in order.
    pub fn opened_segments(&self) -> &[u64] {
        &self.opened
    }

    pub fn close_count(&self) -> usize {
        self.closes
    }

    pub fn is_segment_open(&self) -> bool {
        self.open_segment.is_some()
    }
}

impl WalReader for MemoryWalReader {
    fn segment_open(&mut self, segno: u64) -> io::Result<()> {
        self.open_segment = Some(segno);
        self.opened.push(segno);
        Ok(())
    }

    fn read_record(&mut self, at: Lsn) -> io::Result<Option<WalRecord>> {
        if self.open_segment != Some(at.segment_number(WAL_SEGMENT_SIZE)) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("segment for {} is not open", at),
            ));
        }
        if let Some(fail) = self.fail_at {
            if at >= fail {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "simulated read failure"));
            }
        }
        Ok(self.records.iter().find(|r| r.lsn >= at).cloned())
    }

    fn segment_close(&mut self) {
        if self.open_segment.take().is_some() {
            self.closes += 1;
        }
    }
}
