//! Anchored logical slot creation
//!
//! Entry point for creating a logical replication slot positioned at a
//! caller-supplied LSN, typically the point where an old primary stopped,
//! before a standby is promoted past it.

mod request;
mod requirements;
mod service;

pub use request::CreateAnchoredSlot;
pub use requirements::{DecodingRequirements, WalLevel};
pub use service::SlotAnchorService;
