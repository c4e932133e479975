//! Verification receipts.
//!
//! A receipt is written beside an artifact after its signature verifies. It
//! records the artifact's SHA-256 digest and the signing key so a later
//! install can prove the archive on disk is the one that was verified,
//! without re-running GnuPG or trusting file names.

use super::trust::TrustRecord;
use crate::state::durable::write_durably;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix appended to an artifact file name to form its receipt name.
pub const RECEIPT_SUFFIX: &str = ".receipt.json";

/// Errors arising from reading, writing, or checking receipts.
#[derive(Debug, thiserror::Error)]
pub enum ReceiptError {
    /// No receipt exists for the artifact.
    #[error("{artifact} has not been verified (no receipt at {path})")]
    Missing {
        /// The artifact lacking a receipt.
        artifact: PathBuf,
        /// Where the receipt was expected.
        path: PathBuf,
    },

    /// A file could not be read or written.
    #[error("receipt I/O failed for {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The receipt is not valid JSON of the expected shape.
    #[error("malformed receipt {path}: {source}")]
    Malformed {
        /// The receipt file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The receipt names a different artifact.
    #[error("receipt is for {recorded}, not {actual}")]
    WrongArtifact {
        /// File name stored in the receipt.
        recorded: String,
        /// File name of the artifact being checked.
        actual: String,
    },

    /// The artifact changed since it was verified.
    #[error("{artifact} changed since verification (expected sha256 {expected}, found {actual})")]
    DigestMismatch {
        /// The artifact that changed.
        artifact: PathBuf,
        /// Digest stored in the receipt.
        expected: String,
        /// Digest of the file on disk.
        actual: String,
    },

    /// The artifact was verified with a different key than the one recorded.
    #[error("receipt key {recorded} does not match recorded key {expected}")]
    KeyMismatch {
        /// Fingerprint the caller expected.
        expected: String,
        /// Fingerprint stored in the receipt.
        recorded: String,
    },
}

/// Proof that a specific artifact's signature was verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReceipt {
    artifact: String,
    sha256: String,
    verified: TrustRecord,
}

impl VerificationReceipt {
    /// Build a receipt for `artifact` from a fresh trust record.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiptError::Io`] if the artifact cannot be hashed.
    pub fn issue(artifact: &Path, verified: TrustRecord) -> Result<Self, ReceiptError> {
        let sha256 = compute_sha256(artifact).map_err(|source| ReceiptError::Io {
            path: artifact.to_path_buf(),
            source,
        })?;
        Ok(Self {
            artifact: file_name(artifact),
            sha256,
            verified,
        })
    }

    /// Return the receipt path for `artifact`.
    #[must_use]
    pub fn path_for(artifact: &Path) -> PathBuf {
        let mut name = artifact.file_name().unwrap_or_default().to_os_string();
        name.push(RECEIPT_SUFFIX);
        artifact.with_file_name(name)
    }

    /// Durably write this receipt beside `artifact` and return its path.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiptError::Io`] if the write fails.
    pub fn write_beside(&self, artifact: &Path) -> Result<PathBuf, ReceiptError> {
        let path = Self::path_for(artifact);
        let mut json = serde_json::to_vec_pretty(self).map_err(|source| ReceiptError::Malformed {
            path: path.clone(),
            source,
        })?;
        json.push(b'\n');
        write_durably(&path, &json).map_err(|source| ReceiptError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Load the receipt stored beside `artifact`.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiptError::Missing`] when there is no receipt, or an I/O
    /// or parse error when it cannot be read.
    pub fn load_for(artifact: &Path) -> Result<Self, ReceiptError> {
        let path = Self::path_for(artifact);
        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ReceiptError::Missing {
                    artifact: artifact.to_path_buf(),
                    path,
                });
            }
            Err(source) => return Err(ReceiptError::Io { path, source }),
        };
        serde_json::from_slice(&contents).map_err(|source| ReceiptError::Malformed { path, source })
    }

    /// Confirm the receipt still describes `artifact` and was signed by
    /// `expected_fingerprint`.
    ///
    /// # Errors
    ///
    /// Returns the first mismatch found: artifact name, key, then digest.
    pub fn check(&self, artifact: &Path, expected_fingerprint: &str) -> Result<(), ReceiptError> {
        let actual_name = file_name(artifact);
        if self.artifact != actual_name {
            return Err(ReceiptError::WrongArtifact {
                recorded: self.artifact.clone(),
                actual: actual_name,
            });
        }

        if self.verified.key_fingerprint() != expected_fingerprint {
            return Err(ReceiptError::KeyMismatch {
                expected: expected_fingerprint.to_owned(),
                recorded: self.verified.key_fingerprint().to_owned(),
            });
        }

        let actual = compute_sha256(artifact).map_err(|source| ReceiptError::Io {
            path: artifact.to_path_buf(),
            source,
        })?;
        if actual != self.sha256 {
            return Err(ReceiptError::DigestMismatch {
                artifact: artifact.to_path_buf(),
                expected: self.sha256.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Return the artifact file name the receipt covers.
    #[must_use]
    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    /// Return the lowercase hex SHA-256 digest of the verified artifact.
    #[must_use]
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Return the trust record established at verification time.
    #[must_use]
    pub fn verified(&self) -> &TrustRecord {
        &self.verified
    }
}

/// Compute the lowercase hex SHA-256 digest of a file.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub fn compute_sha256(path: &Path) -> std::io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::trust::VerificationMethod;

    const KEY: &str = "14F26682D0916CDD81E37B6D61B7B526D98F0353";

    fn artifact_in(dir: &Path, contents: &[u8]) -> PathBuf {
        let path = dir.join("firefox-128.0.tar.xz");
        fs::write(&path, contents).expect("write artifact");
        path
    }

    fn trust() -> TrustRecord {
        TrustRecord::new(VerificationMethod::Gpg, KEY)
    }

    #[test]
    fn digest_matches_known_value() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("abc");
        fs::write(&path, b"abc").expect("write");
        assert_eq!(
            compute_sha256(&path).expect("hash"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn receipt_path_sits_beside_artifact() {
        assert_eq!(
            VerificationReceipt::path_for(Path::new("/cache/firefox-128.0.tar.xz")),
            PathBuf::from("/cache/firefox-128.0.tar.xz.receipt.json")
        );
    }

    #[test]
    fn written_receipt_loads_and_checks() {
        let temp = tempfile::tempdir().expect("temp dir");
        let artifact = artifact_in(temp.path(), b"archive bytes");

        let receipt = VerificationReceipt::issue(&artifact, trust()).expect("issue");
        let path = receipt.write_beside(&artifact).expect("write");
        assert!(path.exists());

        let loaded = VerificationReceipt::load_for(&artifact).expect("load");
        assert_eq!(loaded, receipt);
        assert_eq!(loaded.artifact(), "firefox-128.0.tar.xz");
        loaded.check(&artifact, KEY).expect("check passes");
    }

    #[test]
    fn modified_artifact_fails_check() {
        let temp = tempfile::tempdir().expect("temp dir");
        let artifact = artifact_in(temp.path(), b"archive bytes");
        let receipt = VerificationReceipt::issue(&artifact, trust()).expect("issue");

        fs::write(&artifact, b"tampered bytes").expect("tamper");
        let err = receipt.check(&artifact, KEY).expect_err("must fail");
        assert!(matches!(err, ReceiptError::DigestMismatch { .. }), "got {err:?}");
    }

    #[test]
    fn different_key_fails_check() {
        let temp = tempfile::tempdir().expect("temp dir");
        let artifact = artifact_in(temp.path(), b"archive bytes");
        let receipt = VerificationReceipt::issue(&artifact, trust()).expect("issue");

        let err = receipt.check(&artifact, "0011223344").expect_err("must fail");
        assert!(matches!(err, ReceiptError::KeyMismatch { .. }), "got {err:?}");
    }

    #[test]
    fn receipt_for_another_artifact_fails_check() {
        let temp = tempfile::tempdir().expect("temp dir");
        let artifact = artifact_in(temp.path(), b"archive bytes");
        let receipt = VerificationReceipt::issue(&artifact, trust()).expect("issue");

        let other = temp.path().join("firefox-129.0.tar.xz");
        fs::write(&other, b"archive bytes").expect("write other");
        let err = receipt.check(&other, KEY).expect_err("must fail");
        assert!(matches!(err, ReceiptError::WrongArtifact { .. }), "got {err:?}");
    }

    #[test]
    fn missing_receipt_is_reported() {
        let temp = tempfile::tempdir().expect("temp dir");
        let artifact = artifact_in(temp.path(), b"archive bytes");

        let err = VerificationReceipt::load_for(&artifact).expect_err("must fail");
        assert!(matches!(err, ReceiptError::Missing { .. }), "got {err:?}");
        assert!(err.to_string().contains("has not been verified"));
    }

    #[test]
    fn malformed_receipt_is_reported() {
        let temp = tempfile::tempdir().expect("temp dir");
        let artifact = artifact_in(temp.path(), b"archive bytes");
        fs::write(VerificationReceipt::path_for(&artifact), b"{not json").expect("write");

        let err = VerificationReceipt::load_for(&artifact).expect_err("must fail");
        assert!(matches!(err, ReceiptError::Malformed { .. }), "got {err:?}");
    }
}
