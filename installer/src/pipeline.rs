//! Command orchestration for fetch, verify, install, and status.
//!
//! Each command takes its collaborators as trait objects so the binary can
//! pass real network, GnuPG, and tar implementations while tests pass stubs.
//! Every command that writes holds the directory locks it needs for its
//! whole run.

use crate::config::Config;
use crate::dirs::{CACHE_DIR_MODE, SYSTEM_DIR_MODE, ensure_dir};
use crate::error::{InstallerError, Result};
use crate::fetch::Fetcher;
use crate::install::{ArchiveExtractor, AtomicInstaller, InstalledTree};
use crate::lock::DirLock;
use crate::output::{format_status_human, format_status_json, write_stderr_line};
use crate::release::artifact::ReleaseArtifact;
use crate::release::source::ReleaseSource;
use crate::state::{InstallState, StateError, StateStore, load_installed};
use crate::verification::receipt::VerificationReceipt;
use crate::verification::{SignatureVerifier, TrustRecord};
use log::debug;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Settings shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct PipelineContext<'a> {
    /// Loaded configuration.
    pub config: &'a Config,
    /// Suppress progress output.
    pub quiet: bool,
}

impl PipelineContext<'_> {
    fn progress(&self, stderr: &mut dyn Write, message: impl std::fmt::Display) {
        if !self.quiet {
            write_stderr_line(stderr, message);
        }
    }

    fn state_dir(&self) -> &Path {
        self.config.state_dir.as_std_path()
    }

    fn install_dir(&self) -> &Path {
        self.config.install_dir.as_std_path()
    }
}

/// Resolve, download, and verify the latest release into `cache_dir`, then
/// record it in the cached state.
///
/// Nothing named after the release is written until the resolved URL has
/// parsed, and nothing is recorded unless the signature verifies.
///
/// # Errors
///
/// Returns the first failure from locking, resolution, parsing, download,
/// verification, or state persistence.
pub fn run_fetch(
    context: &PipelineContext<'_>,
    cache_dir: &Path,
    source: &dyn ReleaseSource,
    verifier: &dyn SignatureVerifier,
    stderr: &mut dyn Write,
) -> Result<InstallState> {
    prepare_dir(cache_dir, CACHE_DIR_MODE)?;
    let _lock = DirLock::acquire(cache_dir)?;

    context.progress(stderr, format!("Resolving {}...", context.config.permalink));
    let url = source.resolve_latest_url(&context.config.permalink)?;
    let artifact = ReleaseArtifact::parse(&url)?;
    context.progress(stderr, format!("Latest release is {artifact}"));

    let fetcher = Fetcher::new(cache_dir, source);
    discard_receipt(&fetcher.artifact_path(&artifact))?;
    context.progress(stderr, format!("Downloading {}...", artifact.filename()));
    let signature = fetcher.fetch_signature(&artifact)?;
    let archive = fetcher.fetch_artifact(&artifact)?;

    let trust = verify_and_issue_receipt(verifier, &signature, &archive)?;
    context.progress(stderr, format!("Verified {} ({trust})", artifact.filename()));

    let store = StateStore::new(cache_dir, context.state_dir(), context.install_dir());
    let state = store.record_fetch_state(&artifact, &trust)?;
    context.progress(
        stderr,
        format!("Ready to install; run: ffpkg install --cache {}", cache_dir.display()),
    );
    Ok(state)
}

/// Verify `tarball` against `signature`, write a receipt beside the
/// tarball, and print the signing key fingerprint to `stdout`.
///
/// # Errors
///
/// Returns an error if the tarball path is unusable, its directory is
/// locked, or the signature does not verify.
pub fn run_verify(
    context: &PipelineContext<'_>,
    tarball: &Path,
    signature: &Path,
    verifier: &dyn SignatureVerifier,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<TrustRecord> {
    if tarball.file_name().is_none() {
        return Err(InstallerError::InvalidPath {
            path: tarball.to_path_buf(),
            reason: "expected a file",
        });
    }
    let dir = containing_dir(tarball);
    let _lock = DirLock::acquire(&dir)?;

    discard_receipt(tarball)?;
    context.progress(stderr, format!("Verifying {}...", tarball.display()));
    let trust = verify_and_issue_receipt(verifier, signature, tarball)?;

    writeln!(stdout, "{}", trust.key_fingerprint())
        .map_err(|source| InstallerError::WriteFailed { source })?;
    Ok(trust)
}

/// Install the verified archive recorded in `cache_dir`, then promote the
/// cached record into the state directory.
///
/// # Errors
///
/// Returns an error if nothing was fetched, the archive lacks a matching
/// receipt, the cached record targets another directory, or extraction,
/// the swap, or the promotion fails.
pub fn run_install(
    context: &PipelineContext<'_>,
    cache_dir: &Path,
    extractor: &dyn ArchiveExtractor,
    stderr: &mut dyn Write,
) -> Result<InstalledTree> {
    if !cache_dir.is_dir() {
        return Err(InstallerError::MissingFetchState {
            cache_dir: cache_dir.to_path_buf(),
        });
    }
    prepare_dir(context.state_dir(), SYSTEM_DIR_MODE)?;
    let _state_lock = DirLock::acquire(context.state_dir())?;
    let _cache_lock = DirLock::acquire(cache_dir)?;

    let store = StateStore::new(cache_dir, context.state_dir(), context.install_dir());
    let cached = store.load_cached().map_err(|e| match e {
        StateError::Missing { .. } => InstallerError::MissingFetchState {
            cache_dir: cache_dir.to_path_buf(),
        },
        other => other.into(),
    })?;
    if cached.installed_at() != context.install_dir() {
        return Err(InstallerError::InstallPathMismatch {
            recorded: cached.installed_at().to_path_buf(),
            configured: context.install_dir().to_path_buf(),
        });
    }

    let archive = cache_dir.join(cached.artifact_filename());
    let receipt = VerificationReceipt::load_for(&archive)?;
    receipt.check(&archive, cached.verified().key_fingerprint())?;
    debug!("receipt for {} matches sha256 {}", archive.display(), receipt.sha256());

    context.progress(
        stderr,
        format!(
            "Installing {} {} to {}...",
            cached.name(),
            cached.version(),
            context.install_dir().display()
        ),
    );
    let tree = AtomicInstaller::new(context.install_dir())
        .stage(&archive, extractor)?
        .commit()?;
    store.promote()?;

    context.progress(
        stderr,
        format!("Installed {} {}", cached.name(), cached.version()),
    );
    Ok(tree)
}

/// Print the system-wide install record to `stdout`.
///
/// # Errors
///
/// Returns an error if the record exists but cannot be read, or if writing
/// the report fails.
pub fn run_status(context: &PipelineContext<'_>, json: bool, stdout: &mut dyn Write) -> Result<()> {
    let installed = load_installed(context.state_dir())?;
    let report = if json {
        format_status_json(installed.as_ref())
    } else {
        format_status_human(installed.as_ref())
    };
    writeln!(stdout, "{report}").map_err(|source| InstallerError::WriteFailed { source })
}

fn verify_and_issue_receipt(
    verifier: &dyn SignatureVerifier,
    signature: &Path,
    archive: &Path,
) -> Result<TrustRecord> {
    let trust = verifier.verify(signature, archive)?;
    let receipt = VerificationReceipt::issue(archive, trust.clone())
        .map_err(InstallerError::ReceiptWrite)?;
    let path = receipt
        .write_beside(archive)
        .map_err(InstallerError::ReceiptWrite)?;
    debug!("wrote receipt {}", path.display());
    Ok(trust)
}

/// Remove any receipt left from an earlier verification of `archive`.
fn discard_receipt(archive: &Path) -> Result<()> {
    let path = VerificationReceipt::path_for(archive);
    match std::fs::remove_file(&path) {
        Ok(()) => {
            debug!("discarded stale receipt {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(InstallerError::RemoveStale { path, source }),
    }
}

fn prepare_dir(path: &Path, mode: u32) -> Result<()> {
    ensure_dir(path, mode).map_err(|source| InstallerError::PrepareDirectory {
        path: path.to_path_buf(),
        source,
    })
}

fn containing_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
