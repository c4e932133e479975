//! The durable install record.

use crate::release::artifact::ReleaseArtifact;
use crate::verification::trust::TrustRecord;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What is installed, where, and which key vouched for it.
///
/// The JSON form is the on-disk schema shared by the cached and system-wide
/// copies:
///
/// ```json
/// {
///   "name": "firefox-developer",
///   "version": "121.0a1",
///   "installed_at": "/opt/firefox-developer-edition",
///   "verified": { "method": "gpg", "key_fingerprint": "14F2..." }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallState {
    name: String,
    version: String,
    installed_at: PathBuf,
    verified: TrustRecord,
}

impl InstallState {
    /// Build a record for `artifact` that will be installed at `installed_at`.
    #[must_use]
    pub fn new(artifact: &ReleaseArtifact, installed_at: &Path, verified: TrustRecord) -> Self {
        Self {
            name: artifact.name().to_owned(),
            version: artifact.version().to_owned(),
            installed_at: installed_at.to_path_buf(),
            verified,
        }
    }

    /// Return the application name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the application version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Return the install location.
    #[must_use]
    pub fn installed_at(&self) -> &Path {
        &self.installed_at
    }

    /// Return the trust record for the installed artifact.
    #[must_use]
    pub fn verified(&self) -> &TrustRecord {
        &self.verified
    }

    /// Return the cache file name of the artifact this record describes.
    #[must_use]
    pub fn artifact_filename(&self) -> String {
        ReleaseArtifact::filename_for(&self.name, &self.version)
    }
}
