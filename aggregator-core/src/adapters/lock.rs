//! Advisory file lock serializing migration runs
//!
//! The migration engine performs no locking of its own. Processes sharing a
//! database file take this lock around `set_db_version` so two walks never
//! race on the version record.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::domain::result::{Error, Result};

/// Exclusive lock on `<database file>.migrate.lock`, released on drop
#[derive(Debug)]
pub struct MigrationLock {
    file: File,
    path: PathBuf,
}

impl MigrationLock {
    /// Lock file path belonging to a database file
    pub fn lock_path(db_path: &Path) -> PathBuf {
        let mut name = db_path.as_os_str().to_owned();
        name.push(".migrate.lock");
        PathBuf::from(name)
    }

    /// Block until the lock is ours
    pub fn acquire(db_path: &Path) -> Result<Self> {
        let (file, path) = Self::open(db_path)?;
        file.lock_exclusive()?;
        tracing::debug!(path = %path.display(), "migration lock acquired");
        Ok(Self { file, path })
    }

    /// Take the lock if nobody else holds it
    pub fn try_acquire(db_path: &Path) -> Result<Self> {
        let (file, path) = Self::open(db_path)?;
        file.try_lock_exclusive()
            .map_err(|e| Error::Lock(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "migration lock acquired");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(db_path: &Path) -> Result<(File, PathBuf)> {
        let path = Self::lock_path(db_path);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        Ok((file, path))
    }
}

impl Drop for MigrationLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), "failed to release migration lock: {}", e);
        }
    }
}
