//! Error types for the ffpkg CLI.
//!
//! Each component reports failures through its own error enum; this module
//! gathers them into [`InstallerError`], which the binary prints as a single
//! line before exiting. Variants that the user can act on carry a hint.

use crate::config::ConfigError;
use crate::install::SwapError;
use crate::lock::LockError;
use crate::release::artifact::ArtifactParseError;
use crate::release::source::DownloadError;
use crate::state::StateError;
use crate::verification::{ReceiptError, VerifyError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running an ffpkg command.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No cache directory is configured and none could be derived.
    #[error("could not determine the user cache directory; set cache_dir in the configuration")]
    NoCacheDir,

    /// A working directory could not be created.
    #[error("failed to create directory {path}: {source}")]
    PrepareDirectory {
        /// The directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Another ffpkg process holds a directory lock, or locking failed.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Resolving or downloading a release file failed.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// The resolved URL does not name a recognised release archive.
    #[error(transparent)]
    ArtifactParse(#[from] ArtifactParseError),

    /// The signature did not verify.
    #[error("verification failed: {0}")]
    Verify(#[from] VerifyError),

    /// The artifact to install lacks a matching verification receipt.
    #[error("verification required: {0}; run: ffpkg verify")]
    VerificationRequired(#[from] ReceiptError),

    /// A verification succeeded but its receipt could not be written.
    #[error("failed to record verification: {0}")]
    ReceiptWrite(#[source] ReceiptError),

    /// A file left by an earlier run could not be removed.
    #[error("failed to remove stale file {path}: {source}")]
    RemoveStale {
        /// The file that could not be removed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// `install` found no cached record from a previous fetch.
    #[error("nothing has been fetched into {cache_dir}; run: ffpkg fetch")]
    MissingFetchState {
        /// The cache directory that was searched.
        cache_dir: PathBuf,
    },

    /// The cached record targets a different directory than the configuration.
    #[error("cached record installs to {recorded}, but install_dir is {configured}")]
    InstallPathMismatch {
        /// Install path stored in the cached record.
        recorded: PathBuf,
        /// Install path from the configuration.
        configured: PathBuf,
    },

    /// Reading or writing an install record failed.
    #[error(transparent)]
    State(#[from] StateError),

    /// Extracting or swapping the installed tree failed.
    #[error("install failed: {0}")]
    Install(#[from] SwapError),

    /// A command-line path argument is unusable.
    #[error("invalid argument {path}: {reason}")]
    InvalidPath {
        /// The offending path.
        path: PathBuf,
        /// Why it cannot be used.
        reason: &'static str,
    },

    /// Failed to write output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;
