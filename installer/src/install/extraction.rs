//! Streaming extraction of `.tar.xz` release archives.
//!
//! Entries are validated before anything touches the disk: absolute paths
//! and `..` components are rejected, as is any file or directory entry whose
//! path, or any ancestor of it, is a symlink created earlier in the same
//! archive. Directory modes are applied once every entry is in place so a
//! read-only directory cannot block its own children. Devices, fifos, and
//! hard links are skipped.

use log::{debug, warn};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tar::EntryType;

/// Trait for extracting release archives, enabling test mocking.
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor {
    /// Extract the archive at `archive_path` into the existing `dest_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::PathTraversal`] if any entry attempts to
    /// escape `dest_dir`, [`ExtractionError::EmptyArchive`] if nothing was
    /// extracted, or [`ExtractionError::Io`] on I/O failures.
    fn extract(
        &self,
        archive_path: &Path,
        dest_dir: &Path,
    ) -> Result<ExtractionSummary, ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] io::Error),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive produced no files, directories, or links.
    #[error("archive contains no entries")]
    EmptyArchive,
}

/// Counts of what an extraction produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    /// Directories created.
    pub directories: usize,
    /// Regular files written.
    pub files: usize,
    /// Symbolic links created.
    pub symlinks: usize,
    /// Entries of unsupported types that were ignored.
    pub skipped: usize,
}

impl ExtractionSummary {
    fn extracted(&self) -> usize {
        self.directories + self.files + self.symlinks
    }
}

/// Default extractor using the `tar` and `xz2` crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarXzExtractor;

impl ArchiveExtractor for TarXzExtractor {
    fn extract(
        &self,
        archive_path: &Path,
        dest_dir: &Path,
    ) -> Result<ExtractionSummary, ExtractionError> {
        let file = fs::File::open(archive_path)?;
        let decoder = xz2::read::XzDecoder::new_multi_decoder(file);
        unpack(decoder, dest_dir)
    }
}

/// Extract an uncompressed tar stream into `dest_dir`.
///
/// # Errors
///
/// See [`ArchiveExtractor::extract`].
pub fn unpack<R: io::Read>(
    reader: R,
    dest_dir: &Path,
) -> Result<ExtractionSummary, ExtractionError> {
    let mut archive = tar::Archive::new(reader);
    let mut summary = ExtractionSummary::default();
    let mut directory_modes = Vec::new();

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let entry_path = entry.path()?.into_owned();
        validate_entry_path(&entry_path)?;

        let relative = normalise(&entry_path);
        if relative.as_os_str().is_empty() {
            continue;
        }
        let entry_type = entry.header().entry_type();
        // A symlink entry may name an existing link; anything else written
        // at a link would land wherever it points.
        reject_symlinks_on_path(dest_dir, &relative, !entry_type.is_symlink())?;
        let dest_path = dest_dir.join(&relative);
        let mode = entry.header().mode()?;

        match entry_type {
            EntryType::Directory => {
                fs::create_dir_all(&dest_path)?;
                directory_modes.push((dest_path, mode));
                summary.directories += 1;
            }
            EntryType::Regular | EntryType::Continuous => {
                create_parent(&dest_path)?;
                write_file(&mut entry, &dest_path, mode)?;
                summary.files += 1;
            }
            EntryType::Symlink => {
                let Some(target) = entry.link_name()? else {
                    warn!("skipping symlink without target: {}", relative.display());
                    summary.skipped += 1;
                    continue;
                };
                create_parent(&dest_path)?;
                create_symlink(&target, &dest_path)?;
                summary.symlinks += 1;
            }
            other => {
                debug!("skipping {other:?} entry {}", relative.display());
                summary.skipped += 1;
            }
        }
    }

    // Deepest first, so tightening a parent never blocks a child.
    for (path, mode) in directory_modes.iter().rev() {
        set_mode(path, *mode)?;
    }

    if summary.extracted() == 0 {
        return Err(ExtractionError::EmptyArchive);
    }
    Ok(summary)
}

/// Validate that a tar entry path does not escape the destination
/// directory via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    if path.is_absolute() {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    for component in path.components() {
        if matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        ) {
            return Err(ExtractionError::PathTraversal {
                path: path.display().to_string(),
            });
        }
    }
    Ok(())
}

fn normalise(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| matches!(component, Component::Normal(_)))
        .collect()
}

/// Refuse to write through a symlink that an earlier entry planted inside
/// the destination. With `include_leaf`, the entry's own path must not be a
/// symlink either.
fn reject_symlinks_on_path(
    dest_dir: &Path,
    relative: &Path,
    include_leaf: bool,
) -> Result<(), ExtractionError> {
    let checked = if include_leaf {
        Some(relative)
    } else {
        relative.parent()
    };
    let Some(checked) = checked else {
        return Ok(());
    };
    let mut current = dest_dir.to_path_buf();
    for component in checked.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                return Err(ExtractionError::PathTraversal {
                    path: relative.display().to_string(),
                });
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn create_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}

fn write_file(reader: &mut impl io::Read, path: &Path, mode: u32) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode & 0o7777).custom_flags(libc::O_NOFOLLOW);
    }
    let mut file = options.open(path)?;
    io::copy(reader, &mut file)?;
    // The process umask may have masked bits at creation time.
    set_file_mode(&file, mode)
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    match std::os::unix::fs::symlink(target, link) {
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            debug!("symlink {} already exists", link.display());
            Ok(())
        }
        other => other,
    }
}

#[cfg(not(unix))]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    debug!(
        "skipping symlink {} -> {} on this platform",
        link.display(),
        target.display()
    );
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_file_mode(file: &fs::File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn set_file_mode(_file: &fs::File, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
#[path = "extraction_tests.rs"]
mod tests;
