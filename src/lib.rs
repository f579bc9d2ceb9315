//! slotanchor - logical replication slots anchored at a chosen LSN
//!
//! Creates a durable logical replication slot at a caller-supplied WAL
//! position instead of the current write position, so a slot can be
//! pre-provisioned on a future primary at the exact point the old
//! primary stopped.

pub mod anchor;
pub mod auth;
pub mod cli;
pub mod config;
pub mod crash_point;
pub mod decoding;
pub mod errors;
pub mod horizon;
pub mod observability;
pub mod session;
pub mod slot;
pub mod timeline;
pub mod types;
