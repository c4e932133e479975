//! Advisory locking for the cache, state, and install directories.
//!
//! Each command holds an exclusive `flock`-style lock on a `.ffpkg.lock` file
//! for its whole run, so two concurrent invocations cannot interleave
//! downloads, extraction, or state writes. The lock is released when the
//! guard is dropped.

use fs2::FileExt;
use log::{trace, warn};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Name of the lock file created inside a locked directory.
pub const LOCK_FILENAME: &str = ".ffpkg.lock";

/// Errors arising from lock acquisition.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Another process holds the lock.
    #[error("{path} is locked by another ffpkg process")]
    Held {
        /// The contended lock file.
        path: PathBuf,
    },

    /// The lock file could not be opened or locked.
    #[error("failed to lock {path}: {source}")]
    Io {
        /// The lock file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// An exclusive advisory lock on a directory.
#[derive(Debug)]
pub struct DirLock {
    file: File,
    path: PathBuf,
}

impl DirLock {
    /// Acquire the lock for `dir` without blocking.
    ///
    /// The directory must already exist.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Held`] when another process owns the lock, or
    /// [`LockError::Io`] when the lock file cannot be opened.
    pub fn acquire(dir: &Path) -> Result<Self, LockError> {
        let path = dir.join(LOCK_FILENAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| LockError::Io {
                path: path.clone(),
                source,
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                trace!("acquired lock {}", path.display());
                Ok(Self { file, path })
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(LockError::Held { path })
            }
            Err(source) => Err(LockError::Io { path, source }),
        }
    }

    /// Return the path of the held lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("failed to release lock {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_reports_held_lock() {
        let temp = tempfile::tempdir().expect("temp dir");
        let first = DirLock::acquire(temp.path()).expect("first lock");

        let err = DirLock::acquire(temp.path()).expect_err("second lock must fail");
        assert!(matches!(err, LockError::Held { .. }), "got {err:?}");
        assert!(err.to_string().contains(LOCK_FILENAME));
        drop(first);
    }

    #[test]
    fn lock_is_released_on_drop() {
        let temp = tempfile::tempdir().expect("temp dir");
        let first = DirLock::acquire(temp.path()).expect("first lock");
        assert_eq!(first.path(), temp.path().join(LOCK_FILENAME));
        drop(first);

        DirLock::acquire(temp.path()).expect("lock after release");
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let temp = tempfile::tempdir().expect("temp dir");
        let err = DirLock::acquire(&temp.path().join("absent")).expect_err("must fail");
        assert!(matches!(err, LockError::Io { .. }));
    }
}
