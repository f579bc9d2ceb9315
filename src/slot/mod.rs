//! Replication slots
//!
//! A slot is a named, durable cursor into the WAL stream together with
//! the transaction horizons decoding from it still needs.
//!
//! # Persistency
//!
//! Slots start `Ephemeral` (or `Temporary`) and are promoted to
//! `Persistent` only once fully initialized. An ephemeral slot never
//! survives its creator's failure or a restart.

mod data;
mod handle;
mod lifecycle;
mod lock;
mod registry;
mod store;

pub use data::{
    validate_slot_name, SlotInfo, SlotKind, SlotPersistency, SlotPersistentData, SlotState,
    MAX_SLOT_NAME_LEN,
};
pub use handle::SlotHandle;
pub use lifecycle::{AnchoredSlot, SlotDurability, SlotLifecycleManager};
pub use lock::DataDirLock;
pub use registry::{SlotEntry, SlotRegistry};
pub use store::SlotStore;
