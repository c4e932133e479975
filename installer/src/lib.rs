//! ffpkg library.
//!
//! This crate fetches signed Firefox release archives into a per-user cache,
//! verifies them with GnuPG, and installs them atomically into a system
//! directory. It is used by the `ffpkg` CLI binary and can be driven
//! programmatically with stub network, verifier, and extractor
//! implementations for testing.
//!
//! # Modules
//!
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - TOML configuration with built-in defaults
//! - [`dirs`] - Cache directory resolution and directory creation
//! - [`error`] - Top-level error type with recovery hints
//! - [`fetch`] - Cache-side download of archives and signatures
//! - [`install`] - Safe `.tar.xz` extraction and the atomic directory swap
//! - [`lock`] - Advisory directory locks
//! - [`output`] - Progress and status formatting
//! - [`pipeline`] - Orchestration of the fetch, verify, install, and status commands
//! - [`release`] - Permalink resolution and release file naming
//! - [`state`] - Durable install records
//! - [`verification`] - Signature checks, trust records, and receipts

pub mod cli;
pub mod config;
pub mod dirs;
pub mod error;
pub mod fetch;
pub mod install;
pub mod lock;
pub mod output;
pub mod pipeline;
pub mod release;
pub mod state;
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
pub mod verification;
