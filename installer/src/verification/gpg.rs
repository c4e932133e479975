//! Detached-signature verification through GnuPG.
//!
//! The verifier runs `gpg --verify <signature> <artifact>` and scrapes the
//! signing key fingerprint from its combined output. The scraping is kept
//! behind [`SignatureVerifier`] so callers and tests never see GnuPG's text
//! format. Every failure is fatal: a non-zero exit, a timeout, or output
//! without a fingerprint all yield an error and no [`TrustRecord`].

use super::trust::{TrustRecord, VerificationMethod};
use log::{debug, warn};
use regex::Regex;
use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::sync::OnceLock;
use std::time::Duration;
use wait_timeout::ChildExt;

/// Verifies a detached signature against an artifact.
#[cfg_attr(test, mockall::automock)]
pub trait SignatureVerifier {
    /// Check `signature` against `artifact` and return the signing key.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError`] if the signature is invalid or the result
    /// cannot be established.
    fn verify(&self, signature: &Path, artifact: &Path) -> Result<TrustRecord, VerifyError>;
}

/// Abstraction for running the external verification program.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    /// Run `program` with `args` and return its captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from spawning or waiting on the process;
    /// a timeout is reported as [`std::io::ErrorKind::TimedOut`].
    fn run(&self, program: &str, args: &[OsString]) -> std::io::Result<Output>;
}

/// Runs programs on the host with a wall-clock timeout.
#[derive(Debug, Clone, Copy)]
pub struct SystemCommandRunner {
    timeout: Duration,
}

impl SystemCommandRunner {
    /// Create a runner that kills programs running longer than `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> std::io::Result<Output> {
        let mut child = Command::new(program)
            .args(args)
            // Fingerprint scraping depends on untranslated output.
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        match child.wait_timeout(self.timeout)? {
            Some(status) => {
                let stdout = child
                    .stdout
                    .take()
                    .map(std::io::read_to_string)
                    .transpose()?
                    .unwrap_or_default();
                let stderr = child
                    .stderr
                    .take()
                    .map(std::io::read_to_string)
                    .transpose()?
                    .unwrap_or_default();
                Ok(Output {
                    status,
                    stdout: stdout.into_bytes(),
                    stderr: stderr.into_bytes(),
                })
            }
            None => {
                if let Err(e) = child.kill() {
                    warn!("failed to kill {program}: {e}");
                }
                if let Err(e) = child.wait() {
                    warn!("failed to reap {program}: {e}");
                }
                Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("{program} did not finish within {}s", self.timeout.as_secs()),
                ))
            }
        }
    }
}

/// Errors arising from signature verification.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The verification program could not be started or waited on.
    #[error("could not run {program}: {source}")]
    ToolUnavailable {
        /// The program that failed to run.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The verification program exceeded its timeout and was killed.
    #[error("{program} timed out while checking the signature")]
    TimedOut {
        /// The program that timed out.
        program: String,
    },

    /// The verification program rejected the signature.
    #[error("signature check failed ({status}): {output}")]
    SignatureRejected {
        /// The exit status reported by the program.
        status: String,
        /// The program's combined output.
        output: String,
    },

    /// The program succeeded but printed no recognisable key fingerprint.
    #[error("cannot parse key fingerprint from {program} output")]
    FingerprintNotFound {
        /// The program whose output was unparseable.
        program: String,
    },
}

/// GnuPG-backed [`SignatureVerifier`].
#[derive(Debug, Clone)]
pub struct GpgVerifier<R = SystemCommandRunner> {
    program: String,
    runner: R,
}

impl GpgVerifier<SystemCommandRunner> {
    /// Create a verifier that runs `program` on the host with `timeout`.
    #[must_use]
    pub fn system(program: &str, timeout: Duration) -> Self {
        Self::with_runner(program, SystemCommandRunner::new(timeout))
    }
}

impl<R: CommandRunner> GpgVerifier<R> {
    /// Create a verifier with an injected command runner.
    #[must_use]
    pub fn with_runner(program: &str, runner: R) -> Self {
        Self {
            program: program.to_owned(),
            runner,
        }
    }
}

impl<R: CommandRunner> SignatureVerifier for GpgVerifier<R> {
    fn verify(&self, signature: &Path, artifact: &Path) -> Result<TrustRecord, VerifyError> {
        let args = [
            OsString::from("--verify"),
            signature.as_os_str().to_owned(),
            artifact.as_os_str().to_owned(),
        ];
        debug!(
            "running {} --verify {} {}",
            self.program,
            signature.display(),
            artifact.display()
        );

        let output = self.runner.run(&self.program, &args).map_err(|source| {
            if source.kind() == std::io::ErrorKind::TimedOut {
                VerifyError::TimedOut {
                    program: self.program.clone(),
                }
            } else {
                VerifyError::ToolUnavailable {
                    program: self.program.clone(),
                    source,
                }
            }
        })?;

        let combined = combined_output(&output);
        if !output.status.success() {
            return Err(VerifyError::SignatureRejected {
                status: output.status.to_string(),
                output: combined.trim().to_owned(),
            });
        }

        let fingerprint =
            parse_fingerprint(&combined).ok_or_else(|| VerifyError::FingerprintNotFound {
                program: self.program.clone(),
            })?;
        Ok(TrustRecord::new(VerificationMethod::Gpg, fingerprint))
    }
}

fn combined_output(output: &Output) -> String {
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

#[expect(clippy::expect_used, reason = "literal pattern is covered by unit tests")]
fn fingerprint_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"using [A-Za-z0-9]+ key ([0-9A-F]+)\b").expect("fingerprint pattern compiles")
    })
}

/// Extract the signing key fingerprint from GnuPG's verification output.
///
/// # Examples
///
/// ```
/// use ffpkg::verification::gpg::parse_fingerprint;
///
/// let output = "gpg:                using RSA key 09BEED63F3462A2DFFAB3B875ECB6497C1A20256\n";
/// assert_eq!(
///     parse_fingerprint(output).as_deref(),
///     Some("09BEED63F3462A2DFFAB3B875ECB6497C1A20256")
/// );
/// assert_eq!(parse_fingerprint("gpg: Good signature"), None);
/// ```
#[must_use]
pub fn parse_fingerprint(output: &str) -> Option<String> {
    fingerprint_pattern()
        .captures(output)
        .and_then(|captures| captures.get(1))
        .map(|key| key.as_str().to_owned())
}

#[cfg(test)]
#[path = "gpg_tests.rs"]
mod tests;
