//! Timeline history providers

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::errors::{SlotError, SlotResult};
use crate::types::TimelineId;

use super::history::TimelineHistory;

/// Source of the server's timeline history.
pub trait TimelineHistoryProvider: Send + Sync {
    /// Timeline the server is running on.
    fn current_timeline(&self) -> TimelineId;

    /// Reads the full history of the current timeline.
    fn read_history(&self) -> SlotResult<TimelineHistory>;
}

impl TimelineHistoryProvider for TimelineHistory {
    fn current_timeline(&self) -> TimelineId {
        TimelineHistory::current_timeline(self)
    }

    fn read_history(&self) -> SlotResult<TimelineHistory> {
        Ok(self.clone())
    }
}

/// History file name for a timeline: eight upper-case hex digits.
pub fn history_file_name(timeline: TimelineId) -> String {
    format!("{:08X}.history", timeline.value())
}

/// Reads history files from a WAL directory.
#[derive(Debug, Clone)]
pub struct FileHistoryProvider {
    dir: PathBuf,
    current: TimelineId,
}

impl FileHistoryProvider {
    pub fn new(dir: impl Into<PathBuf>, current: TimelineId) -> Self {
        Self {
            dir: dir.into(),
            current,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TimelineHistoryProvider for FileHistoryProvider {
    fn current_timeline(&self) -> TimelineId {
        self.current
    }

    fn read_history(&self) -> SlotResult<TimelineHistory> {
        // Timeline 1 never has a history file.
        if self.current.value() == 1 {
            return Ok(TimelineHistory::single(self.current));
        }

        let path = self.dir.join(history_file_name(self.current));
        match fs::read_to_string(&path) {
            Ok(content) => TimelineHistory::parse(self.current, &content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Ok(TimelineHistory::single(self.current))
            }
            Err(e) => Err(SlotError::TimelineHistory(format!(
                "could not open file \"{}\": {}",
                path.display(),
                e
            ))),
        }
    }
}
