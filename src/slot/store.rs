//! On-disk slot state
//!
//! Layout: `<data_dir>/replslot/<name>/state`, a JSON envelope carrying a
//! CRC32 of the serialized slot data.
//!
//! Writes follow the atomic file pattern:
//! 1. Write `state.tmp`
//! 2. fsync it
//! 3. Rename over `state`
//! 4. fsync the slot directory
//!
//! Removal renames the slot directory to `<name>.tmp` before deleting it,
//! so a crash mid-removal leaves only debris that `load_all` clears.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data::{SlotPersistentData, SlotPersistency};
use crate::crash_point::{maybe_crash, points};
use crate::errors::{SlotError, SlotResult};
use crate::observability::{log_event_with_fields, Event};

const SLOT_DIR_NAME: &str = "replslot";
const STATE_FILE_NAME: &str = "state";
const TEMP_SUFFIX: &str = ".tmp";

/// Envelope format version
const STATE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StateEnvelope {
    version: u32,
    checksum: u32,
    data: SlotPersistentData,
}

fn state_checksum(data: &SlotPersistentData) -> SlotResult<u32> {
    let bytes = serde_json::to_vec(data).map_err(|e| {
        SlotError::Corruption(format!("failed to serialize slot \"{}\": {}", data.name, e))
    })?;
    Ok(crc32fast::hash(&bytes))
}

/// Map an I/O error on `path` to `SlotError::Io`, naming the action.
pub(super) fn io_at<'a>(
    action: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> SlotError + 'a {
    move |e| SlotError::io(format!("could not {} \"{}\"", action, path.display()), e)
}

fn sync_dir(path: &Path) -> io::Result<()> {
    File::open(path)?.sync_all()
}

/// Durable storage for slot state files.
#[derive(Debug, Clone)]
pub struct SlotStore {
    root: PathBuf,
}

impl SlotStore {
    /// Store rooted at `<data_dir>/replslot`.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.join(SLOT_DIR_NAME),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn slot_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn state_path(&self, name: &str) -> PathBuf {
        self.slot_dir(name).join(STATE_FILE_NAME)
    }

    /// Create the slot directory and write its first state file.
    ///
    /// The directory is created exclusively: an existing directory of
    /// that name belongs to another slot and is never reused.
    pub fn create(&self, data: &SlotPersistentData) -> SlotResult<()> {
        fs::create_dir_all(&self.root).map_err(io_at("create directory", &self.root))?;

        let dir = self.slot_dir(&data.name);
        fs::create_dir(&dir).map_err(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists {
                SlotError::AlreadyExists(data.name.clone())
            } else {
                io_at("create directory", &dir)(e)
            }
        })?;
        sync_dir(&self.root).map_err(io_at("fsync directory", &self.root))?;
        self.write(data)
    }

    /// Atomically replace the slot's state file.
    pub fn write(&self, data: &SlotPersistentData) -> SlotResult<()> {
        let dir = self.slot_dir(&data.name);
        let final_path = dir.join(STATE_FILE_NAME);
        let temp_path = dir.join(format!("{}{}", STATE_FILE_NAME, TEMP_SUFFIX));

        let envelope = StateEnvelope {
            version: STATE_VERSION,
            checksum: state_checksum(data)?,
            data: data.clone(),
        };
        let content = serde_json::to_vec_pretty(&envelope).map_err(|e| {
            SlotError::Corruption(format!("failed to serialize slot \"{}\": {}", data.name, e))
        })?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(io_at("create file", &temp_path))?;
        file.write_all(&content).map_err(io_at("write to file", &temp_path))?;
        file.sync_all().map_err(io_at("fsync file", &temp_path))?;
        drop(file);

        maybe_crash(points::SLOT_STATE_BEFORE_RENAME);

        fs::rename(&temp_path, &final_path).map_err(|e| {
            let context = format!(
                "could not rename file \"{}\" to \"{}\"",
                temp_path.display(),
                final_path.display()
            );
            SlotError::io(context, e)
        })?;
        sync_dir(&dir).map_err(io_at("fsync directory", &dir))?;

        Ok(())
    }

    /// Read and verify one slot's state file.
    pub fn read(&self, name: &str) -> SlotResult<SlotPersistentData> {
        let path = self.state_path(name);
        let content = fs::read(&path).map_err(io_at("read file", &path))?;

        let envelope: StateEnvelope = serde_json::from_slice(&content).map_err(|e| {
            SlotError::Corruption(format!(
                "file \"{}\" is not valid slot state: {}",
                path.display(),
                e
            ))
        })?;

        if envelope.version != STATE_VERSION {
            return Err(SlotError::Corruption(format!(
                "file \"{}\" has unsupported version {}",
                path.display(),
                envelope.version
            )));
        }

        let expected = state_checksum(&envelope.data)?;
        if envelope.checksum != expected {
            return Err(SlotError::Corruption(format!(
                "checksum mismatch for file \"{}\": is {}, should be {}",
                path.display(),
                envelope.checksum,
                expected
            )));
        }

        if envelope.data.name != name {
            return Err(SlotError::Corruption(format!(
                "file \"{}\" holds slot \"{}\"",
                path.display(),
                envelope.data.name
            )));
        }

        Ok(envelope.data)
    }

    /// Remove a slot's directory. Missing directories are not an error.
    pub fn remove(&self, name: &str) -> SlotResult<()> {
        let dir = self.slot_dir(name);
        if !dir.exists() {
            return Ok(());
        }

        let doomed = self.root.join(format!("{}{}", name, TEMP_SUFFIX));
        fs::rename(&dir, &doomed).map_err(|e| {
            SlotError::io(
                format!("could not rename file \"{}\" to \"{}\"", dir.display(), doomed.display()),
                e,
            )
        })?;
        sync_dir(&self.root).map_err(io_at("fsync directory", &self.root))?;

        maybe_crash(points::SLOT_DROP_AFTER_REMOVE);

        // The rename already made the drop durable; leftovers are cleared on restore.
        if let Err(e) = fs::remove_dir_all(&doomed) {
            log_event_with_fields(
                Event::SlotStateUnknown,
                &[
                    ("path", &doomed.display().to_string()),
                    ("reason", &format!("could not remove directory: {}", e)),
                ],
            );
        }
        Ok(())
    }

    /// Load every slot state under the root.
    ///
    /// `*.tmp` debris and directories without a committed state file are
    /// removed. Ephemeral states are returned; the caller decides what to
    /// do with them.
    pub fn load_all(&self) -> SlotResult<Vec<SlotPersistentData>> {
        fs::create_dir_all(&self.root).map_err(io_at("create directory", &self.root))?;

        let entries = fs::read_dir(&self.root).map_err(io_at("open directory", &self.root))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_at("read directory", &self.root))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();

            if name.ends_with(TEMP_SUFFIX) {
                fs::remove_dir_all(&path).map_err(io_at("remove directory", &path))?;
                continue;
            }

            if !path.join(STATE_FILE_NAME).exists() {
                // Creation crashed before the first state file was committed
                fs::remove_dir_all(&path).map_err(io_at("remove directory", &path))?;
                continue;
            }

            let stale = path.join(format!("{}{}", STATE_FILE_NAME, TEMP_SUFFIX));
            if stale.exists() {
                fs::remove_file(&stale).map_err(io_at("remove file", &stale))?;
            }

            names.push(name);
        }
        names.sort();

        names.iter().map(|name| self.read(name)).collect()
    }
}

/// True if state loaded from disk must be discarded instead of restored.
pub fn is_discarded_on_restore(data: &SlotPersistentData) -> bool {
    data.persistency != SlotPersistency::Persistent
}
