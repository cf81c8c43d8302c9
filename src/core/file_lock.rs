//! flock(2)-based locking for the audit log.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

/// A held lock. Dropping it closes the file, which releases the flock.
pub struct FileLock {
    _file: File,
}

impl FileLock {
    /// Block until an exclusive lock is held. Used by writers.
    pub fn exclusive(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        file.lock_exclusive()
            .with_context(|| format!("acquire exclusive lock {}", path.display()))?;
        Ok(Self { _file: file })
    }

    /// Block until a shared lock is held. Readers may hold it concurrently.
    pub fn shared(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        file.lock_shared()
            .with_context(|| format!("acquire shared lock {}", path.display()))?;
        Ok(Self { _file: file })
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("open lock file {}", path.display()))
}
