//! Shared test utilities for the ffpkg crate.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! behaviour suites under `tests/`.

use crate::release::source::{DownloadError, ReleaseSource};
use crate::verification::gpg::CommandRunner;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::Path;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with empty stdout and stderr.
pub fn success_output() -> Output {
    output_with_stderr(0, "")
}

/// Creates a failed command `Output` with the given stderr message.
pub fn failure_output(stderr: &str) -> Output {
    output_with_stderr(1, stderr)
}

/// Creates a command `Output` with the given exit code and stderr text.
pub fn output_with_stderr(code: i32, stderr: &str) -> Output {
    Output {
        status: exit_status(code),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Typical `gpg --verify` output for a good signature by `fingerprint`.
pub fn good_signature_output(fingerprint: &str) -> Output {
    output_with_stderr(
        0,
        &format!(
            concat!(
                "gpg: Signature made Tue 09 Jul 2024 12:00:00 UTC\n",
                "gpg:                using RSA key {}\n",
                "gpg: Good signature from \"Mozilla Software Releases <release@mozilla.com>\"\n",
            ),
            fingerprint
        ),
    )
}

/// A [`CommandRunner`] that returns a canned output and records every
/// invocation.
#[derive(Debug)]
pub struct StubRunner {
    output: Output,
    calls: RefCell<Vec<(String, Vec<OsString>)>>,
}

impl StubRunner {
    /// Creates a runner that always returns `output`.
    pub fn new(output: Output) -> Self {
        Self {
            output,
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Returns the `(program, args)` pairs seen so far.
    pub fn calls(&self) -> Vec<(String, Vec<OsString>)> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for StubRunner {
    fn run(&self, program: &str, args: &[OsString]) -> io::Result<Output> {
        self.calls
            .borrow_mut()
            .push((program.to_owned(), args.to_vec()));
        Ok(self.output.clone())
    }
}

impl CommandRunner for &StubRunner {
    fn run(&self, program: &str, args: &[OsString]) -> io::Result<Output> {
        (*self).run(program, args)
    }
}

/// A [`ReleaseSource`] serving in-memory bodies.
///
/// The permalink resolves to `latest_url`; downloads of unknown URLs fail
/// with [`DownloadError::NotFound`]. Every request is recorded.
#[derive(Debug, Default)]
pub struct StubSource {
    latest_url: Option<String>,
    bodies: HashMap<String, Vec<u8>>,
    requests: RefCell<Vec<String>>,
}

impl StubSource {
    /// Creates a source whose permalink redirects to `latest_url`.
    pub fn redirecting_to(latest_url: &str) -> Self {
        Self {
            latest_url: Some(latest_url.to_owned()),
            ..Self::default()
        }
    }

    /// Creates a source whose permalink cannot be reached.
    pub fn unreachable() -> Self {
        Self::default()
    }

    /// Serves `body` for `url`.
    #[must_use]
    pub fn with_body(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.to_owned(), body.into());
        self
    }

    /// Returns every URL requested, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl ReleaseSource for StubSource {
    fn resolve_latest_url(&self, permalink: &str) -> Result<String, DownloadError> {
        self.requests.borrow_mut().push(permalink.to_owned());
        self.latest_url
            .clone()
            .ok_or_else(|| DownloadError::HttpError {
                url: permalink.to_owned(),
                reason: "connection refused".to_owned(),
            })
    }

    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        self.requests.borrow_mut().push(url.to_owned());
        let body = self.bodies.get(url).ok_or_else(|| DownloadError::NotFound {
            url: url.to_owned(),
        })?;
        std::fs::write(dest, body)?;
        Ok(())
    }
}

/// One entry of a test archive built by [`write_tar_xz`].
#[derive(Debug, Clone)]
pub enum ArchiveEntry {
    /// A directory with the given mode.
    Dir {
        /// Path inside the archive.
        path: String,
        /// Permission bits.
        mode: u32,
    },
    /// A regular file.
    File {
        /// Path inside the archive.
        path: String,
        /// File contents.
        contents: Vec<u8>,
        /// Permission bits.
        mode: u32,
    },
    /// A symbolic link.
    Symlink {
        /// Path inside the archive.
        path: String,
        /// Link target.
        target: String,
    },
    /// A character device node.
    CharDevice {
        /// Path inside the archive.
        path: String,
    },
    /// A regular file whose name is written without validation, for
    /// exercising traversal checks.
    RawFile {
        /// Raw name bytes written to the header.
        name: String,
        /// File contents.
        contents: Vec<u8>,
    },
}

impl ArchiveEntry {
    /// A directory with mode `0755`.
    pub fn dir(path: &str) -> Self {
        Self::Dir {
            path: path.to_owned(),
            mode: 0o755,
        }
    }

    /// A regular file with the given mode.
    pub fn file(path: &str, contents: &[u8], mode: u32) -> Self {
        Self::File {
            path: path.to_owned(),
            contents: contents.to_vec(),
            mode,
        }
    }

    /// A symbolic link to `target`.
    pub fn symlink(path: &str, target: &str) -> Self {
        Self::Symlink {
            path: path.to_owned(),
            target: target.to_owned(),
        }
    }
}

/// Writes `entries` as an uncompressed tar stream into `writer`.
///
/// # Errors
///
/// Returns any I/O error from the tar builder.
pub fn write_tar<W: Write>(writer: W, entries: &[ArchiveEntry]) -> io::Result<W> {
    let mut builder = tar::Builder::new(writer);
    for entry in entries {
        match entry {
            ArchiveEntry::Dir { path, mode } => {
                let mut header = header(tar::EntryType::Directory, *mode, 0);
                builder.append_data(&mut header, path, io::empty())?;
            }
            ArchiveEntry::File {
                path,
                contents,
                mode,
            } => {
                let mut header = header(tar::EntryType::Regular, *mode, contents.len());
                builder.append_data(&mut header, path, contents.as_slice())?;
            }
            ArchiveEntry::Symlink { path, target } => {
                let mut header = header(tar::EntryType::Symlink, 0o777, 0);
                builder.append_link(&mut header, path, target)?;
            }
            ArchiveEntry::CharDevice { path } => {
                let mut header = header(tar::EntryType::Char, 0o644, 0);
                builder.append_data(&mut header, path, io::empty())?;
            }
            ArchiveEntry::RawFile { name, contents } => {
                let mut header = header(tar::EntryType::Regular, 0o644, contents.len());
                for (slot, byte) in header.as_old_mut().name.iter_mut().zip(name.bytes()) {
                    *slot = byte;
                }
                header.set_cksum();
                builder.append(&header, contents.as_slice())?;
            }
        }
    }
    builder.into_inner()
}

/// Writes `entries` as a `.tar.xz` archive at `path`.
///
/// # Errors
///
/// Returns any I/O error from file creation, tar, or xz encoding.
pub fn write_tar_xz(path: &Path, entries: &[ArchiveEntry]) -> io::Result<()> {
    let file = std::fs::File::create(path)?;
    let encoder = xz2::write::XzEncoder::new(file, 6);
    let encoder = write_tar(encoder, entries)?;
    encoder.finish()?.sync_all()
}

fn header(entry_type: tar::EntryType, mode: u32, size: usize) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_mode(mode);
    header.set_size(u64::try_from(size).unwrap_or(u64::MAX));
    header.set_mtime(0);
    header
}
