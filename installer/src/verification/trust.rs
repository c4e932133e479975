//! Trust records produced by successful signature verification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The mechanism that established trust in an artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMethod {
    /// A detached OpenPGP signature checked with GnuPG.
    #[default]
    Gpg,
}

impl fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpg => write!(f, "gpg"),
        }
    }
}

/// Proof that a signature was valid, naming the signing key.
///
/// Only a verifier constructs these after the external tool succeeded and
/// its output yielded a fingerprint.
///
/// # Examples
///
/// ```
/// use ffpkg::verification::trust::{TrustRecord, VerificationMethod};
///
/// let record = TrustRecord::new(VerificationMethod::Gpg, "14F26682D0916CDD81E37B6D61B7B526D98F0353");
/// assert_eq!(record.method(), VerificationMethod::Gpg);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustRecord {
    method: VerificationMethod,
    key_fingerprint: String,
}

impl TrustRecord {
    /// Create a trust record for a verified key.
    #[must_use]
    pub fn new(method: VerificationMethod, key_fingerprint: impl Into<String>) -> Self {
        Self {
            method,
            key_fingerprint: key_fingerprint.into(),
        }
    }

    /// Return the verification method.
    #[must_use]
    pub fn method(&self) -> VerificationMethod {
        self.method
    }

    /// Return the hex fingerprint of the signing key.
    #[must_use]
    pub fn key_fingerprint(&self) -> &str {
        &self.key_fingerprint
    }
}

impl fmt::Display for TrustRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} key {}", self.method, self.key_fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialises_with_lowercase_method() {
        let record = TrustRecord::new(VerificationMethod::Gpg, "ABCDEF0123");
        let json = serde_json::to_value(&record).expect("serialise");
        assert_eq!(
            json,
            serde_json::json!({"method": "gpg", "key_fingerprint": "ABCDEF0123"})
        );
    }

    #[test]
    fn rejects_unknown_methods() {
        let result: Result<TrustRecord, _> =
            serde_json::from_str(r#"{"method":"minisign","key_fingerprint":"AB"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn display_names_method_and_key() {
        let record = TrustRecord::new(VerificationMethod::Gpg, "ABCDEF0123");
        assert_eq!(record.to_string(), "gpg key ABCDEF0123");
    }
}
