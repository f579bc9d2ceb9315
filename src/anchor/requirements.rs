//! Server settings logical decoding depends on

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{SlotError, SlotResult};
use crate::session::Session;

/// How much information the server writes to WAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalLevel {
    Minimal,
    Replica,
    Logical,
}

impl WalLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalLevel::Minimal => "minimal",
            WalLevel::Replica => "replica",
            WalLevel::Logical => "logical",
        }
    }
}

impl fmt::Display for WalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodingRequirements {
    pub wal_level: WalLevel,
    pub max_replication_slots: usize,
}

impl DecodingRequirements {
    /// Requirements for using replication slots at all.
    pub fn check_slots(&self) -> SlotResult<()> {
        if self.max_replication_slots == 0 {
            return Err(SlotError::DecodingRequirements(
                "replication slots can only be used if max_replication_slots > 0".to_string(),
            ));
        }
        if self.wal_level < WalLevel::Replica {
            return Err(SlotError::DecodingRequirements(
                "replication slots can only be used if wal_level >= replica".to_string(),
            ));
        }
        Ok(())
    }

    /// Requirements for creating a logical slot from `session`.
    pub fn check_logical(&self, session: &Session) -> SlotResult<()> {
        self.check_slots()?;

        if self.wal_level < WalLevel::Logical {
            return Err(SlotError::DecodingRequirements(
                "logical decoding requires wal_level >= logical".to_string(),
            ));
        }
        if session.database().is_empty() {
            return Err(SlotError::DecodingRequirements(
                "logical decoding requires a database connection".to_string(),
            ));
        }
        Ok(())
    }
}
