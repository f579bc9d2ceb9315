//! Slot registry
//!
//! The registry owns every live slot. The map lock doubles as the
//! allocation lock: creating or dropping a slot holds it for writing,
//! including the state-file I/O, so two creators can never race on the
//! same name. Each slot's own mutex is held only for field access.
//!
//! Lock order: map, then per-process acquisition table, then slot.
//!
//! A registry opened over a data directory also holds that directory's
//! lock for its whole lifetime, so no other process can load or change
//! the same slots meanwhile.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};

use super::data::{
    validate_slot_name, SlotInfo, SlotKind, SlotPersistency, SlotPersistentData, SlotState,
};
use super::lock::DataDirLock;
use super::store::{is_discarded_on_restore, SlotStore};
use crate::errors::{SlotError, SlotResult};
use crate::horizon::{SlotXmins, XminSource};
use crate::observability::{log_event_with_fields, Event};
use crate::types::{ProcessId, TransactionId};

/// One live slot.
#[derive(Debug)]
pub struct SlotEntry {
    state: Mutex<SlotState>,
}

impl SlotEntry {
    fn new(state: SlotState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Lock the slot's fields. Never hold the guard across I/O or while
    /// taking another lock.
    pub fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock()
    }

    pub fn info(&self) -> SlotInfo {
        self.lock().info()
    }

    pub fn name(&self) -> String {
        self.lock().data.name.clone()
    }

    pub fn persistency(&self) -> SlotPersistency {
        self.lock().data.persistency
    }
}

/// Registry of live replication slots.
#[derive(Debug)]
pub struct SlotRegistry {
    store: Option<SlotStore>,
    lock: Option<DataDirLock>,
    max_slots: usize,
    slots: RwLock<BTreeMap<String, Arc<SlotEntry>>>,
    /// Slot currently acquired by each process
    acquired: Mutex<HashMap<ProcessId, String>>,
}

impl SlotRegistry {
    /// Registry that keeps nothing on disk.
    pub fn in_memory(max_slots: usize) -> Self {
        Self {
            store: None,
            lock: None,
            max_slots,
            slots: RwLock::new(BTreeMap::new()),
            acquired: Mutex::new(HashMap::new()),
        }
    }

    /// Open the registry under `data_dir`, restoring persistent slots.
    ///
    /// Waits for any other holder of the data directory to let go first.
    /// Ephemeral leftovers from an interrupted creation are deleted. The
    /// caller must recompute the horizon aggregate afterwards.
    pub fn open(data_dir: &Path, max_slots: usize) -> SlotResult<Self> {
        let lock = DataDirLock::acquire(data_dir)?;
        Self::restore(data_dir, lock, max_slots)
    }

    /// Like `open`, but fails with `DataDirLocked` instead of waiting.
    pub fn try_open(data_dir: &Path, max_slots: usize) -> SlotResult<Self> {
        let lock = DataDirLock::try_acquire(data_dir)?;
        Self::restore(data_dir, lock, max_slots)
    }

    fn restore(data_dir: &Path, lock: DataDirLock, max_slots: usize) -> SlotResult<Self> {
        let store = SlotStore::new(data_dir);
        let mut slots = BTreeMap::new();

        for data in store.load_all()? {
            if is_discarded_on_restore(&data) {
                store.remove(&data.name)?;
                log_event_with_fields(
                    Event::SlotRestoreDiscarded,
                    &[("slot", &data.name), ("persistency", data.persistency.as_str())],
                );
                continue;
            }

            if slots.len() >= max_slots {
                return Err(SlotError::NoFreeSlots { max: max_slots });
            }

            log_event_with_fields(
                Event::SlotRestored,
                &[
                    ("slot", &data.name),
                    ("restart_lsn", &data.restart_lsn.to_string()),
                    ("catalog_xmin", &data.catalog_xmin.to_string()),
                ],
            );
            let name = data.name.clone();
            slots.insert(name, Arc::new(SlotEntry::new(SlotState::new(data, None))));
        }

        Ok(Self {
            store: Some(store),
            lock: Some(lock),
            max_slots,
            slots: RwLock::new(slots),
            acquired: Mutex::new(HashMap::new()),
        })
    }

    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    pub fn store(&self) -> Option<&SlotStore> {
        self.store.as_ref()
    }

    /// Path of the held data directory lock, if the registry is on disk.
    pub fn lock_path(&self) -> Option<&Path> {
        self.lock.as_ref().map(DataDirLock::path)
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// All live slots, ordered by name.
    pub fn list(&self) -> Vec<SlotInfo> {
        let entries: Vec<Arc<SlotEntry>> = self.slots.read().values().cloned().collect();
        entries.iter().map(|entry| entry.info()).collect()
    }

    pub fn get(&self, name: &str) -> Option<SlotInfo> {
        let entry = self.slots.read().get(name).cloned();
        entry.map(|entry| entry.info())
    }

    /// Name of the slot `pid` currently has acquired.
    pub fn acquired_by(&self, pid: ProcessId) -> Option<String> {
        self.acquired.lock().get(&pid).cloned()
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Allocate a new slot owned and acquired by `owner`.
    ///
    /// Unless the slot is temporary its state file is written before the
    /// slot becomes visible.
    pub fn create(
        &self,
        name: &str,
        kind: SlotKind,
        database: &str,
        persistency: SlotPersistency,
        owner: ProcessId,
    ) -> SlotResult<Arc<SlotEntry>> {
        validate_slot_name(name)?;

        let mut slots = self.slots.write();

        if slots.contains_key(name) {
            return Err(SlotError::AlreadyExists(name.to_string()));
        }

        if let Some(held) = self.acquired.lock().get(&owner) {
            return Err(SlotError::SlotAlreadyAcquired {
                pid: owner.value(),
                slot: held.clone(),
            });
        }

        if slots.len() >= self.max_slots {
            return Err(SlotError::NoFreeSlots { max: self.max_slots });
        }

        let data = SlotPersistentData::new(name, kind, database, persistency);
        if persistency != SlotPersistency::Temporary {
            if let Some(store) = &self.store {
                if let Err(e) = store.create(&data) {
                    // An existing directory is someone else's slot
                    if !matches!(e, SlotError::AlreadyExists(_)) {
                        discard_partial_create(store, name);
                    }
                    return Err(e);
                }
            }
        }

        let entry = Arc::new(SlotEntry::new(SlotState::new(data, Some(owner))));
        slots.insert(name.to_string(), Arc::clone(&entry));
        self.acquired.lock().insert(owner, name.to_string());

        Ok(entry)
    }

    /// Acquire an existing slot for `owner`.
    pub fn acquire(&self, name: &str, owner: ProcessId) -> SlotResult<Arc<SlotEntry>> {
        let slots = self.slots.read();
        let mut acquired = self.acquired.lock();

        if let Some(held) = acquired.get(&owner) {
            return Err(SlotError::SlotAlreadyAcquired {
                pid: owner.value(),
                slot: held.clone(),
            });
        }

        let entry = slots
            .get(name)
            .cloned()
            .ok_or_else(|| SlotError::SlotNotFound(name.to_string()))?;

        {
            let mut state = entry.lock();
            match state.active_pid {
                Some(pid) if pid != owner => {
                    return Err(SlotError::SlotActive {
                        name: name.to_string(),
                        pid: pid.value(),
                    });
                }
                _ => state.active_pid = Some(owner),
            }
        }

        acquired.insert(owner, name.to_string());
        Ok(entry)
    }

    pub fn mark_dirty(&self, entry: &SlotEntry) {
        entry.lock().dirty = true;
    }

    /// Flush a dirty slot's state to disk. Temporary slots never touch
    /// disk. Returns whether a state file was written.
    pub fn save(&self, entry: &SlotEntry) -> SlotResult<bool> {
        let Some(store) = &self.store else {
            entry.lock().dirty = false;
            return Ok(false);
        };

        let data = {
            let mut state = entry.lock();
            if !state.dirty || state.data.persistency == SlotPersistency::Temporary {
                return Ok(false);
            }
            state.dirty = false;
            state.data.clone()
        };

        if let Err(e) = store.write(&data) {
            entry.lock().dirty = true;
            return Err(e);
        }

        log_event_with_fields(
            Event::SlotSaved,
            &[("slot", &data.name), ("persistency", data.persistency.as_str())],
        );
        Ok(true)
    }

    /// Promote an ephemeral slot to persistent and save it.
    ///
    /// If the save fails the slot is already persistent in memory while
    /// disk still says ephemeral; the error reports that state as unknown.
    pub fn persist(&self, entry: &SlotEntry) -> SlotResult<bool> {
        {
            let mut state = entry.lock();
            state.data.persistency = SlotPersistency::Persistent;
            state.dirty = true;
        }

        self.save(entry).map_err(|e| match e {
            SlotError::Io { context, source, .. } => SlotError::io_unknown_state(context, source),
            other => other,
        })
    }

    /// Give up `owner`'s acquisition of `entry`.
    ///
    /// Persistent slots become available to other processes. Temporary
    /// slots stay owned by the session until `cleanup_session`. A data
    /// xmin that was only effective during creation is dropped.
    pub fn release(&self, entry: &SlotEntry, owner: ProcessId) {
        let name = {
            let mut state = entry.lock();
            if state.data.persistency == SlotPersistency::Persistent {
                state.active_pid = None;
            }
            if !state.data.xmin.is_valid() {
                state.effective_xmin = TransactionId::INVALID;
            }
            state.data.name.clone()
        };

        let mut acquired = self.acquired.lock();
        if acquired.get(&owner) == Some(&name) {
            acquired.remove(&owner);
        }
    }

    /// Drop a slot acquired by `owner`, removing its state from disk.
    ///
    /// If disk removal fails the slot stays registered and acquired.
    pub fn drop_acquired(&self, entry: &SlotEntry, owner: ProcessId) -> SlotResult<()> {
        let (name, persistency) = {
            let state = entry.lock();
            (state.data.name.clone(), state.data.persistency)
        };

        let mut slots = self.slots.write();

        if persistency != SlotPersistency::Temporary {
            if let Some(store) = &self.store {
                store.remove(&name)?;
            }
        }

        slots.remove(&name);
        let mut acquired = self.acquired.lock();
        if acquired.get(&owner) == Some(&name) {
            acquired.remove(&owner);
        }

        Ok(())
    }

    /// Drop every temporary slot owned by `owner` and release whatever
    /// it still has acquired. Returns the names of the dropped slots.
    pub fn cleanup_session(&self, owner: ProcessId) -> Vec<String> {
        let entries: Vec<Arc<SlotEntry>> = self.slots.read().values().cloned().collect();
        let mut dropped = Vec::new();

        for entry in entries {
            let (owned, persistency) = {
                let state = entry.lock();
                (state.active_pid == Some(owner), state.data.persistency)
            };
            if !owned {
                continue;
            }

            if persistency == SlotPersistency::Temporary {
                if self.drop_acquired(&entry, owner).is_ok() {
                    dropped.push(entry.name());
                }
            } else {
                self.release(&entry, owner);
            }
        }

        self.acquired.lock().remove(&owner);
        dropped
    }
}

/// Best-effort cleanup of a slot directory whose creation failed. A
/// failure here leaves debris that the next `open` clears, but is logged
/// since the directory may still be on disk.
fn discard_partial_create(store: &SlotStore, name: &str) {
    if let Err(e) = store.remove(name) {
        log_event_with_fields(
            Event::SlotStateUnknown,
            &[("slot", name), ("phase", "create"), ("error", &e.to_string())],
        );
    }
}

impl XminSource for SlotRegistry {
    fn slot_xmins(&self) -> Vec<SlotXmins> {
        let slots = self.slots.read();
        slots
            .values()
            .map(|entry| {
                let state = entry.lock();
                SlotXmins {
                    xmin: state.effective_xmin,
                    catalog_xmin: state.effective_catalog_xmin,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PID: ProcessId = ProcessId::new(100);

    fn create(
        registry: &SlotRegistry,
        name: &str,
        persistency: SlotPersistency,
    ) -> SlotResult<Arc<SlotEntry>> {
        registry.create(name, SlotKind::Logical, "postgres", persistency, PID)
    }

    #[test]
    fn test_create_registers_acquired_slot() {
        let registry = SlotRegistry::in_memory(4);
        let entry = create(&registry, "a", SlotPersistency::Ephemeral).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(entry.lock().active_pid, Some(PID));
        assert_eq!(registry.acquired_by(PID), Some("a".to_string()));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = SlotRegistry::in_memory(4);
        let entry = create(&registry, "a", SlotPersistency::Ephemeral).unwrap();
        registry.release(&entry, PID);

        let err = create(&registry, "a", SlotPersistency::Ephemeral).unwrap_err();
        assert!(matches!(err, SlotError::AlreadyExists(name) if name == "a"));
    }

    #[test]
    fn test_one_acquired_slot_per_process() {
        let registry = SlotRegistry::in_memory(4);
        create(&registry, "a", SlotPersistency::Ephemeral).unwrap();

        let err = create(&registry, "b", SlotPersistency::Ephemeral).unwrap_err();
        assert!(matches!(err, SlotError::SlotAlreadyAcquired { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_capacity_enforced() {
        let registry = SlotRegistry::in_memory(1);
        let entry = create(&registry, "a", SlotPersistency::Ephemeral).unwrap();
        registry.persist(&entry).unwrap();
        registry.release(&entry, PID);

        let err = create(&registry, "b", SlotPersistency::Ephemeral).unwrap_err();
        assert!(matches!(err, SlotError::NoFreeSlots { max: 1 }));
    }

    #[test]
    fn test_invalid_name_rejected_before_allocation() {
        let registry = SlotRegistry::in_memory(4);
        let err = create(&registry, "Bad-Name", SlotPersistency::Ephemeral).unwrap_err();
        assert!(matches!(err, SlotError::InvalidName { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_release_persistent_clears_owner() {
        let registry = SlotRegistry::in_memory(4);
        let entry = create(&registry, "a", SlotPersistency::Ephemeral).unwrap();
        registry.persist(&entry).unwrap();
        registry.release(&entry, PID);

        assert_eq!(entry.lock().active_pid, None);
        assert_eq!(registry.acquired_by(PID), None);
    }

    #[test]
    fn test_temporary_slot_stays_owned_until_cleanup() {
        let registry = SlotRegistry::in_memory(4);
        let entry = create(&registry, "t", SlotPersistency::Temporary).unwrap();
        registry.release(&entry, PID);

        assert_eq!(entry.lock().active_pid, Some(PID));
        assert_eq!(registry.acquired_by(PID), None);

        let dropped = registry.cleanup_session(PID);
        assert_eq!(dropped, vec!["t".to_string()]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_acquire_active_slot_fails() {
        let registry = SlotRegistry::in_memory(4);
        create(&registry, "a", SlotPersistency::Ephemeral).unwrap();

        let err = registry.acquire("a", ProcessId::new(7)).unwrap_err();
        assert!(matches!(err, SlotError::SlotActive { pid: 100, .. }));

        let err = registry.acquire("missing", ProcessId::new(7)).unwrap_err();
        assert!(matches!(err, SlotError::SlotNotFound(_)));
    }

    #[test]
    fn test_persist_writes_disk_state() {
        let tmp = TempDir::new().unwrap();
        let registry = SlotRegistry::open(tmp.path(), 4).unwrap();
        let entry = create(&registry, "a", SlotPersistency::Ephemeral).unwrap();

        let store = registry.store().unwrap();
        assert_eq!(store.read("a").unwrap().persistency, SlotPersistency::Ephemeral);

        registry.persist(&entry).unwrap();
        assert_eq!(store.read("a").unwrap().persistency, SlotPersistency::Persistent);
        assert!(!entry.lock().dirty);
    }

    #[test]
    fn test_temporary_slot_never_touches_disk() {
        let tmp = TempDir::new().unwrap();
        let registry = SlotRegistry::open(tmp.path(), 4).unwrap();
        let entry = create(&registry, "t", SlotPersistency::Temporary).unwrap();
        registry.mark_dirty(&entry);
        assert!(!registry.save(&entry).unwrap());

        assert!(!registry.store().unwrap().slot_dir("t").exists());
    }

    #[test]
    fn test_drop_acquired_removes_disk_state() {
        let tmp = TempDir::new().unwrap();
        let registry = SlotRegistry::open(tmp.path(), 4).unwrap();
        let entry = create(&registry, "a", SlotPersistency::Ephemeral).unwrap();

        registry.drop_acquired(&entry, PID).unwrap();

        assert!(registry.is_empty());
        assert_eq!(registry.acquired_by(PID), None);
        assert!(!registry.store().unwrap().slot_dir("a").exists());
    }

    #[test]
    fn test_open_restores_persistent_and_discards_ephemeral() {
        let tmp = TempDir::new().unwrap();
        {
            let registry = SlotRegistry::open(tmp.path(), 4).unwrap();
            let kept = create(&registry, "kept", SlotPersistency::Ephemeral).unwrap();
            kept.lock().data.catalog_xmin = TransactionId::new(50);
            registry.persist(&kept).unwrap();
            registry.release(&kept, PID);

            // Simulates a creation interrupted before promotion
            registry
                .create(
                    "lost",
                    SlotKind::Logical,
                    "postgres",
                    SlotPersistency::Ephemeral,
                    ProcessId::new(2),
                )
                .unwrap();
        }

        let registry = SlotRegistry::open(tmp.path(), 4).unwrap();
        let names: Vec<_> = registry.list().into_iter().map(|s| s.slot_name).collect();
        assert_eq!(names, vec!["kept".to_string()]);
        assert!(!registry.store().unwrap().slot_dir("lost").exists());

        let xmins = registry.slot_xmins();
        assert_eq!(xmins[0].catalog_xmin, TransactionId::new(50));
    }

    #[test]
    fn test_existing_directory_is_not_reused() {
        let tmp = TempDir::new().unwrap();
        let registry = SlotRegistry::open(tmp.path(), 4).unwrap();
        let store = registry.store().unwrap();
        std::fs::create_dir_all(store.slot_dir("a")).unwrap();
        std::fs::write(store.state_path("a"), b"owned elsewhere").unwrap();

        let err = create(&registry, "a", SlotPersistency::Ephemeral).unwrap_err();

        assert!(matches!(err, SlotError::AlreadyExists(name) if name == "a"));
        assert_eq!(std::fs::read(store.state_path("a")).unwrap(), b"owned elsewhere");
        assert!(registry.is_empty());
        assert_eq!(registry.acquired_by(PID), None);
    }

    #[test]
    fn test_failed_create_leaves_nothing_behind() {
        let tmp = TempDir::new().unwrap();
        let registry = SlotRegistry::open(tmp.path(), 4).unwrap();
        let root = tmp.path().join("replslot");
        std::fs::remove_dir_all(&root).ok();
        std::fs::write(&root, b"not a directory").unwrap();

        let err = create(&registry, "a", SlotPersistency::Ephemeral).unwrap_err();
        assert!(matches!(err, SlotError::Io { state_unknown: false, .. }));
        assert!(registry.is_empty());

        std::fs::remove_file(&root).unwrap();
        create(&registry, "a", SlotPersistency::Ephemeral).unwrap();
        assert!(registry.store().unwrap().state_path("a").exists());
    }

    #[test]
    fn test_open_holds_data_dir_lock() {
        let tmp = TempDir::new().unwrap();
        let registry = SlotRegistry::open(tmp.path(), 4).unwrap();
        assert_eq!(registry.lock_path(), Some(tmp.path().join(".lock").as_path()));

        let err = SlotRegistry::try_open(tmp.path(), 4).unwrap_err();
        assert!(matches!(err, SlotError::DataDirLocked { .. }));

        drop(registry);
        SlotRegistry::try_open(tmp.path(), 4).unwrap();
    }

    #[test]
    fn test_in_memory_registry_takes_no_lock() {
        assert!(SlotRegistry::in_memory(1).lock_path().is_none());
    }

    #[test]
    fn test_release_drops_creation_only_xmin() {
        let registry = SlotRegistry::in_memory(4);
        let entry = create(&registry, "a", SlotPersistency::Ephemeral).unwrap();
        entry.lock().effective_xmin = TransactionId::new(9);
        registry.persist(&entry).unwrap();
        registry.release(&entry, PID);

        assert!(!entry.lock().effective_xmin.is_valid());
    }
}
