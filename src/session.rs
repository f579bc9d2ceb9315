//! Caller session
//!
//! A session is one client connection: an authenticated role, the
//! database it is connected to, its process identity and the state of
//! its current transaction. Slot operations run synchronously inside a
//! session.

use crate::auth::Identity;
use crate::horizon::HorizonCoordinator;
use crate::types::{ProcessId, TransactionId};

/// State of the session's current transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionState {
    xid: Option<TransactionId>,
}

impl TransactionState {
    /// Returns true once the transaction has been assigned an xid,
    /// which happens on its first write.
    pub fn has_writes(&self) -> bool {
        self.xid.is_some()
    }

    pub fn xid(&self) -> Option<TransactionId> {
        self.xid
    }
}

/// One client connection.
#[derive(Debug, Clone)]
pub struct Session {
    pid: ProcessId,
    identity: Identity,
    database: String,
    transaction: TransactionState,
}

impl Session {
    pub fn new(pid: ProcessId, identity: Identity, database: impl Into<String>) -> Self {
        Self {
            pid,
            identity,
            database: database.into(),
            transaction: TransactionState::default(),
        }
    }

    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn transaction(&self) -> &TransactionState {
        &self.transaction
    }

    /// Assign an xid to the current transaction, as happens on its first
    /// write. Idempotent within one transaction.
    pub fn assign_xid(&mut self, horizon: &HorizonCoordinator) -> TransactionId {
        if let Some(xid) = self.transaction.xid {
            return xid;
        }
        let xid = horizon.begin_transaction();
        self.transaction.xid = Some(xid);
        xid
    }

    /// End the current transaction and start a fresh one.
    pub fn finish_transaction(&mut self, horizon: &HorizonCoordinator) {
        if let Some(xid) = self.transaction.xid.take() {
            horizon.end_transaction(xid);
        }
    }
}
