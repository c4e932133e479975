//! Downloading release files into the per-user cache.
//!
//! Each file is streamed into a temporary sibling and renamed over
//! `<cache>/<filename>` only once the whole body has arrived, so an
//! interrupted transfer never leaves a truncated file under the cache name.
//! Cached files are overwritten on every fetch.

use crate::release::artifact::ReleaseArtifact;
use crate::release::source::{DownloadError, ReleaseSource};
use log::{debug, info};
use std::path::{Path, PathBuf};

/// Downloads an artifact and its signature into a cache directory.
pub struct Fetcher<'a> {
    cache_dir: PathBuf,
    source: &'a dyn ReleaseSource,
}

impl<'a> Fetcher<'a> {
    /// Create a fetcher writing into the existing `cache_dir`.
    #[must_use]
    pub fn new(cache_dir: &Path, source: &'a dyn ReleaseSource) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
            source,
        }
    }

    /// Return the cache path for `artifact`.
    #[must_use]
    pub fn artifact_path(&self, artifact: &ReleaseArtifact) -> PathBuf {
        self.cache_dir.join(artifact.filename())
    }

    /// Return the cache path for the signature of `artifact`.
    #[must_use]
    pub fn signature_path(&self, artifact: &ReleaseArtifact) -> PathBuf {
        self.cache_dir.join(artifact.signature_filename())
    }

    /// Download the artifact into `<cache>/<filename>`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] if the transfer or the final rename fails.
    pub fn fetch_artifact(&self, artifact: &ReleaseArtifact) -> Result<PathBuf, DownloadError> {
        let dest = self.artifact_path(artifact);
        self.fetch_to(artifact.url(), &dest)?;
        Ok(dest)
    }

    /// Download the detached signature into `<cache>/<filename>.asc`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] if the transfer or the final rename fails.
    pub fn fetch_signature(&self, artifact: &ReleaseArtifact) -> Result<PathBuf, DownloadError> {
        let dest = self.signature_path(artifact);
        self.fetch_to(&artifact.signature_url(), &dest)?;
        Ok(dest)
    }

    fn fetch_to(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        let partial = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".part")
            .tempfile_in(&self.cache_dir)?
            .into_temp_path();

        info!("downloading {url}");
        // Dropping `partial` on error removes the incomplete file.
        self.source.download(url, &partial)?;
        partial.persist(dest).map_err(|e| DownloadError::Io(e.error))?;
        debug!("cached {}", dest.display());
        Ok(())
    }
}

impl std::fmt::Debug for Fetcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}
