//! Atomic replacement of the install directory.
//!
//! Installation is a typestate: [`AtomicInstaller::stage`] extracts into a
//! hidden sibling of the install path and yields a [`StagedInstall`];
//! [`StagedInstall::commit`] swaps it into place and yields an
//! [`InstalledTree`]. Dropping a `StagedInstall` abandons it and removes the
//! staging directory, leaving the install path untouched.
//!
//! The final rename is atomic, but the previous tree has to be removed
//! first. Between those two steps the install path does not exist; a crash
//! there is repaired by running `install` again.

use super::extraction::{ArchiveExtractor, ExtractionError, ExtractionSummary};
use crate::dirs::{SYSTEM_DIR_MODE, ensure_dir};
use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Prefix of staging directories created beside the install path.
pub const STAGING_PREFIX: &str = ".ffpkg-";

/// Errors arising while staging or swapping an install.
#[derive(Debug, thiserror::Error)]
pub enum SwapError {
    /// The install path has no usable parent directory.
    #[error("install path {path} has no parent directory")]
    NoParent {
        /// The configured install path.
        path: PathBuf,
    },

    /// The parent or staging directory could not be created.
    #[error("failed to prepare staging beside {path}: {source}")]
    Prepare {
        /// The directory being prepared.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Extraction into the staging directory failed.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The previous tree could not be removed.
    #[error("failed to remove previous install at {path}: {source}")]
    RemovePrevious {
        /// The install path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The staging directory could not be renamed into place.
    #[error("failed to move {from} to {to}: {source}")]
    Rename {
        /// The staging directory.
        from: PathBuf,
        /// The install path.
        to: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Installs archives at a fixed path.
#[derive(Debug, Clone)]
pub struct AtomicInstaller {
    install_dir: PathBuf,
}

impl AtomicInstaller {
    /// Create an installer targeting `install_dir`.
    #[must_use]
    pub fn new(install_dir: &Path) -> Self {
        Self {
            install_dir: install_dir.to_path_buf(),
        }
    }

    /// Return the install path.
    #[must_use]
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Extract `archive` into a fresh staging directory.
    ///
    /// On error the staging directory is removed and the install path is
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::Prepare`] if the staging directory cannot be
    /// created, or [`SwapError::Extraction`] if the archive is rejected.
    pub fn stage(
        &self,
        archive: &Path,
        extractor: &dyn ArchiveExtractor,
    ) -> Result<StagedInstall, SwapError> {
        let parent = self
            .install_dir
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .ok_or_else(|| SwapError::NoParent {
                path: self.install_dir.clone(),
            })?;
        ensure_dir(parent, SYSTEM_DIR_MODE).map_err(|source| SwapError::Prepare {
            path: parent.to_path_buf(),
            source,
        })?;

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(parent)
            .map_err(|source| SwapError::Prepare {
                path: parent.to_path_buf(),
                source,
            })?;
        debug!(
            "extracting {} into {}",
            archive.display(),
            staging.path().display()
        );

        let summary = extractor.extract(archive, staging.path())?;
        set_root_mode(staging.path()).map_err(|source| SwapError::Prepare {
            path: staging.path().to_path_buf(),
            source,
        })?;

        Ok(StagedInstall {
            staging,
            install_dir: self.install_dir.clone(),
            summary,
        })
    }
}

/// An extracted tree waiting to be swapped into place.
#[derive(Debug)]
pub struct StagedInstall {
    staging: TempDir,
    install_dir: PathBuf,
    summary: ExtractionSummary,
}

impl StagedInstall {
    /// Return the staging directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.staging.path()
    }

    /// Return what extraction produced.
    #[must_use]
    pub fn summary(&self) -> ExtractionSummary {
        self.summary
    }

    /// Replace the install path with the staged tree.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::RemovePrevious`] if the old tree cannot be
    /// removed, or [`SwapError::Rename`] if the staged tree cannot be moved.
    /// Either way the staging directory is cleaned up.
    pub fn commit(self) -> Result<InstalledTree, SwapError> {
        let replaced_previous = remove_previous(&self.install_dir)?;
        if replaced_previous {
            warn!(
                "{} is absent until the new tree is moved into place",
                self.install_dir.display()
            );
        }

        fs::rename(self.staging.path(), &self.install_dir).map_err(|source| SwapError::Rename {
            from: self.staging.path().to_path_buf(),
            to: self.install_dir.clone(),
            source,
        })?;
        info!("installed {}", self.install_dir.display());

        // The staging path no longer exists, so dropping the guard is a no-op.
        Ok(InstalledTree {
            path: self.install_dir.clone(),
            replaced_previous,
            summary: self.summary,
        })
    }
}

/// A tree that has been swapped into the install path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledTree {
    path: PathBuf,
    replaced_previous: bool,
    summary: ExtractionSummary,
}

impl InstalledTree {
    /// Return the install path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return whether an earlier tree was removed.
    #[must_use]
    pub fn replaced_previous(&self) -> bool {
        self.replaced_previous
    }

    /// Return what extraction produced.
    #[must_use]
    pub fn summary(&self) -> ExtractionSummary {
        self.summary
    }
}

fn remove_previous(install_dir: &Path) -> Result<bool, SwapError> {
    let metadata = match fs::symlink_metadata(install_dir) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(source) => {
            return Err(SwapError::RemovePrevious {
                path: install_dir.to_path_buf(),
                source,
            });
        }
    };

    let removal = if metadata.is_dir() {
        fs::remove_dir_all(install_dir)
    } else {
        fs::remove_file(install_dir)
    };
    removal.map_err(|source| SwapError::RemovePrevious {
        path: install_dir.to_path_buf(),
        source,
    })?;
    Ok(true)
}

#[cfg(unix)]
fn set_root_mode(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(SYSTEM_DIR_MODE))
}

#[cfg(not(unix))]
fn set_root_mode(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
#[path = "swap_tests.rs"]
mod tests;
