//! Signature verification and the records it produces.
//!
//! [`gpg`] checks detached signatures, [`trust`] holds the resulting
//! [`trust::TrustRecord`], and [`receipt`] binds that record to the exact
//! bytes that were checked.

pub mod gpg;
pub mod receipt;
pub mod trust;

pub use gpg::{GpgVerifier, SignatureVerifier, VerifyError};
pub use receipt::{ReceiptError, VerificationReceipt};
pub use trust::{TrustRecord, VerificationMethod};
