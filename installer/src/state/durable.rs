//! Crash-safe file replacement.
//!
//! A [`PendingWrite`] stages new content in a temporary file created in the
//! destination directory. Committing it syncs and closes the temporary file,
//! renames it over the destination, then syncs the directory so the rename
//! itself is durable. Until the rename happens the destination keeps its
//! previous complete content; abandoning the write (drop or crash) never
//! truncates it.

use log::trace;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Permissions given to committed files on Unix.
pub const FILE_MODE: u32 = 0o644;

/// A replacement for `destination` that has not been committed yet.
#[derive(Debug)]
pub struct PendingWrite {
    temp: NamedTempFile,
    destination: PathBuf,
}

impl PendingWrite {
    /// Start replacing `destination`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the destination has no parent directory or the
    /// temporary file cannot be created there.
    pub fn begin(destination: &Path) -> io::Result<Self> {
        let dir = parent_dir(destination)?;
        let file_name = destination
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = tempfile::Builder::new()
            .prefix(&format!(".{file_name}."))
            .suffix(".tmp")
            .tempfile_in(dir)?;
        Ok(Self {
            temp,
            destination: destination.to_path_buf(),
        })
    }

    /// Return the destination this write will replace.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Return the path of the temporary file holding the new content.
    #[must_use]
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Sync, close, and rename the new content over the destination, then
    /// sync the containing directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error from any step; the destination is unchanged if
    /// the failure happens before the rename.
    pub fn commit(self) -> io::Result<()> {
        let Self { temp, destination } = self;
        let (file, temp_path) = temp.into_parts();
        set_file_mode(&file)?;
        file.sync_all()?;
        drop(file);

        temp_path.persist(&destination).map_err(|e| e.error)?;
        sync_dir(parent_dir(&destination)?)?;
        trace!("committed {}", destination.display());
        Ok(())
    }
}

impl Write for PendingWrite {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.temp.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.temp.flush()
    }
}

/// Replace `destination` with `contents` durably.
///
/// # Errors
///
/// Returns an I/O error from any step of the write.
pub fn write_durably(destination: &Path, contents: &[u8]) -> io::Result<()> {
    let mut pending = PendingWrite::begin(destination)?;
    pending.write_all(contents)?;
    pending.commit()
}

/// Replace `destination` with a copy of `source` durably.
///
/// # Errors
///
/// Returns an I/O error if `source` cannot be read or the write fails.
pub fn copy_durably(source: &Path, destination: &Path) -> io::Result<()> {
    let mut input = File::open(source)?;
    let mut pending = PendingWrite::begin(destination)?;
    io::copy(&mut input, &mut pending)?;
    pending.commit()
}

fn parent_dir(path: &Path) -> io::Result<&Path> {
    path.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no parent directory", path.display()),
            )
        })
}

#[cfg(unix)]
fn set_file_mode(file: &File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(FILE_MODE))
}

#[cfg(not(unix))]
fn set_file_mode(_file: &File) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .expect("read dir")
            .map(|entry| {
                entry
                    .expect("dir entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        names.sort();
        names
    }

    #[test]
    fn write_durably_replaces_existing_content() {
        let temp = tempfile::tempdir().expect("temp dir");
        let destination = temp.path().join("state.json");
        std::fs::write(&destination, b"old content that is longer").expect("seed");

        write_durably(&destination, b"new").expect("write");

        assert_eq!(std::fs::read(&destination).expect("read"), b"new");
        assert_eq!(entries(temp.path()), vec!["state.json".to_owned()]);
    }

    #[test]
    fn abandoned_write_leaves_destination_untouched() {
        let temp = tempfile::tempdir().expect("temp dir");
        let destination = temp.path().join("state.json");
        std::fs::write(&destination, b"{\"version\":\"127.0\"}").expect("seed");

        let mut pending = PendingWrite::begin(&destination).expect("begin");
        pending.write_all(b"{\"version\":\"12").expect("partial write");
        drop(pending);

        assert_eq!(
            std::fs::read(&destination).expect("read"),
            b"{\"version\":\"127.0\"}"
        );
        assert_eq!(entries(temp.path()), vec!["state.json".to_owned()]);
    }

    #[test]
    fn crash_before_rename_leaves_destination_untouched() {
        let temp = tempfile::tempdir().expect("temp dir");
        let destination = temp.path().join("state.json");
        std::fs::write(&destination, b"previous").expect("seed");

        let mut pending = PendingWrite::begin(&destination).expect("begin");
        pending.write_all(b"partial").expect("partial write");
        let leftover = pending.temp_path().to_path_buf();
        // No destructors run when the process dies.
        std::mem::forget(pending);
        sync_dir(temp.path()).expect("sync dir");

        assert_eq!(std::fs::read(&destination).expect("read"), b"previous");
        assert!(leftover.exists());

        write_durably(&destination, b"recovered").expect("later write");
        assert_eq!(std::fs::read(&destination).expect("read"), b"recovered");
    }

    #[test]
    fn copy_durably_creates_missing_destination() {
        let temp = tempfile::tempdir().expect("temp dir");
        let source = temp.path().join("source.json");
        let destination = temp.path().join("dest").join("state.json");
        std::fs::create_dir_all(destination.parent().expect("parent")).expect("mkdir");
        std::fs::write(&source, b"{}").expect("seed source");

        copy_durably(&source, &destination).expect("copy");
        assert_eq!(std::fs::read(&destination).expect("read"), b"{}");
    }

    #[test]
    fn copy_from_missing_source_does_not_create_destination() {
        let temp = tempfile::tempdir().expect("temp dir");
        let destination = temp.path().join("state.json");

        let err = copy_durably(&temp.path().join("absent.json"), &destination)
            .expect_err("missing source must fail");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!destination.exists());
    }

    #[test]
    fn bare_filename_is_rejected() {
        let err = PendingWrite::begin(Path::new("state.json")).expect_err("no parent");
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[cfg(unix)]
    #[test]
    fn committed_files_are_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("temp dir");
        let destination = temp.path().join("state.json");
        write_durably(&destination, b"{}").expect("write");

        let mode = std::fs::metadata(&destination)
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, FILE_MODE);
    }
}
