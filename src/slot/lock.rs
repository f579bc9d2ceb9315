//! Data directory lock
//!
//! One process at a time may hold a registry over a data directory. The
//! lock is an exclusive advisory lock on `<data_dir>/.lock`, taken when
//! the registry opens and released when it is dropped. The kernel drops
//! it if the holder dies, so a crashed process never leaves the
//! directory locked. The lock file itself is never removed.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use super::store::io_at;
use crate::errors::{SlotError, SlotResult};

const LOCK_FILE_NAME: &str = ".lock";

/// Exclusive hold on a data directory.
#[derive(Debug)]
pub struct DataDirLock {
    file: File,
    path: PathBuf,
}

impl DataDirLock {
    /// Lock `data_dir`, waiting for any current holder to let go.
    pub fn acquire(data_dir: &Path) -> SlotResult<Self> {
        let (file, path) = open_lock_file(data_dir)?;
        file.lock_exclusive().map_err(io_at("lock", &path))?;
        Ok(Self { file, path })
    }

    /// Lock `data_dir` or fail with `DataDirLocked` if another holder has it.
    pub fn try_acquire(data_dir: &Path) -> SlotResult<Self> {
        let (file, path) = open_lock_file(data_dir)?;
        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == io::ErrorKind::WouldBlock
                || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
            {
                return Err(SlotError::DataDirLocked { path });
            }
            return Err(io_at("lock", &path)(e));
        }
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DataDirLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn open_lock_file(data_dir: &Path) -> SlotResult<(File, PathBuf)> {
    fs::create_dir_all(data_dir).map_err(io_at("create directory", data_dir))?;

    let path = data_dir.join(LOCK_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .map_err(io_at("open", &path))?;
    Ok((file, path))
}
