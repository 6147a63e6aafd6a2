// Exclusive advisory lock for mutating runs
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

use domainjoin_core::{AppError, Result};

/// Held for the lifetime of a `join` or `configure` run
///
/// The lock file is never unlinked; removing a still-locked file would let a
/// second run lock a fresh inode at the same path.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Take the lock or fail immediately
    ///
    /// # Errors
    /// - AppError::Precondition if another run holds the lock
    /// - AppError::Io if the lock file cannot be created
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(AppError::Precondition(format!(
                "another domainjoin run holds {}",
                path.display()
            )));
        }

        debug!(path = %path.display(), "Run lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!(path = %self.path.display(), "Run lock released");
    }
}
