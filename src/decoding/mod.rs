//! Logical decoding bootstrap
//!
//! Prepares a freshly allocated slot for logical decoding: validates the
//! output plugin and the slot against the session, pins the catalog
//! horizon, and optionally scans WAL from the anchor for a point where
//! decoding can start consistently.
//!
//! WAL access goes through the `WalReader` trait; this crate does not
//! store or parse WAL itself.

mod bootstrap;
mod plugin;
mod reader;
mod snapbuild;

pub use bootstrap::{BootstrapOptions, DecodingBootstrap, DecodingContext};
pub use plugin::PluginRegistry;
pub use reader::{MemoryWalReader, WalReader, WalRecord, WalRecordKind, WAL_SEGMENT_SIZE};
pub use snapbuild::{SnapBuildState, SnapshotBuilder};
