//! Unit tests for archive extraction.

use super::*;
use crate::test_utils::{ArchiveEntry, write_tar, write_tar_xz};
use rstest::rstest;
use tempfile::TempDir;

fn extract_entries(entries: &[ArchiveEntry]) -> (TempDir, Result<ExtractionSummary, ExtractionError>) {
    let temp = tempfile::tempdir().expect("temp dir");
    let archive = temp.path().join("firefox-128.0.tar.xz");
    write_tar_xz(&archive, entries).expect("write archive");
    let dest = temp.path().join("out");
    fs::create_dir(&dest).expect("create dest");
    let result = TarXzExtractor.extract(&archive, &dest);
    (temp, result)
}

#[test]
fn extracts_files_directories_and_links() {
    let (temp, result) = extract_entries(&[
        ArchiveEntry::dir("firefox"),
        ArchiveEntry::file("firefox/firefox", b"#!/bin/sh\n", 0o755),
        ArchiveEntry::file("firefox/application.ini", b"[App]\nVersion=128.0\n", 0o644),
        ArchiveEntry::symlink("firefox/firefox-bin", "firefox"),
    ]);
    let summary = result.expect("extract");
    let out = temp.path().join("out");

    assert_eq!(
        summary,
        ExtractionSummary {
            directories: 1,
            files: 2,
            symlinks: 1,
            skipped: 0,
        }
    );
    assert_eq!(
        fs::read(out.join("firefox/application.ini")).expect("read"),
        b"[App]\nVersion=128.0\n"
    );
    assert_eq!(
        fs::read_link(out.join("firefox/firefox-bin")).expect("read link"),
        PathBuf::from("firefox")
    );
}

#[cfg(unix)]
#[test]
fn preserves_mode_bits() {
    use std::os::unix::fs::PermissionsExt;

    let (temp, result) = extract_entries(&[
        ArchiveEntry::Dir {
            path: "firefox".to_owned(),
            mode: 0o750,
        },
        ArchiveEntry::file("firefox/firefox", b"binary", 0o755),
        ArchiveEntry::file("firefox/omni.ja", b"data", 0o600),
    ]);
    result.expect("extract");
    let out = temp.path().join("out");
    let mode = |path: &str| {
        fs::metadata(out.join(path))
            .expect("metadata")
            .permissions()
            .mode()
            & 0o777
    };

    assert_eq!(mode("firefox"), 0o750);
    assert_eq!(mode("firefox/firefox"), 0o755);
    assert_eq!(mode("firefox/omni.ja"), 0o600);
}

#[cfg(unix)]
#[test]
fn read_only_directories_do_not_block_their_children() {
    use std::os::unix::fs::PermissionsExt;

    let (temp, result) = extract_entries(&[
        ArchiveEntry::Dir {
            path: "firefox".to_owned(),
            mode: 0o555,
        },
        ArchiveEntry::file("firefox/firefox", b"binary", 0o755),
    ]);
    result.expect("extract");
    let dir = temp.path().join("out/firefox");

    assert!(dir.join("firefox").exists());
    assert_eq!(
        fs::metadata(&dir).expect("metadata").permissions().mode() & 0o777,
        0o555
    );
    // Let the temp dir clean up.
    fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).expect("chmod");
}

#[test]
fn devices_are_skipped() {
    let (temp, result) = extract_entries(&[
        ArchiveEntry::file("firefox/firefox", b"binary", 0o755),
        ArchiveEntry::CharDevice {
            path: "firefox/null".to_owned(),
        },
    ]);
    let summary = result.expect("extract");

    assert_eq!(summary.skipped, 1);
    assert!(!temp.path().join("out/firefox/null").exists());
}

#[test]
fn duplicate_symlink_is_tolerated() {
    let (temp, result) = extract_entries(&[
        ArchiveEntry::symlink("firefox-bin", "firefox"),
        ArchiveEntry::symlink("firefox-bin", "firefox"),
    ]);
    result.expect("extract");
    assert!(
        fs::symlink_metadata(temp.path().join("out/firefox-bin"))
            .expect("metadata")
            .file_type()
            .is_symlink()
    );
}

#[rstest]
#[case::parent_dir("../escape.txt")]
#[case::nested_parent("firefox/../../escape.txt")]
#[case::absolute("/tmp/ffpkg-escape.txt")]
fn traversal_entries_are_rejected(#[case] name: &str) {
    let (temp, result) = extract_entries(&[ArchiveEntry::RawFile {
        name: name.to_owned(),
        contents: b"owned".to_vec(),
    }]);

    assert!(
        matches!(result, Err(ExtractionError::PathTraversal { .. })),
        "expected PathTraversal for {name}, got {result:?}"
    );
    assert!(!temp.path().join("escape.txt").exists());
}

#[test]
fn writing_through_an_archive_symlink_is_rejected() {
    let outside = tempfile::tempdir().expect("outside dir");
    let (_temp, result) = extract_entries(&[
        ArchiveEntry::symlink("firefox", &outside.path().display().to_string()),
        ArchiveEntry::file("firefox/evil", b"owned", 0o644),
    ]);

    assert!(
        matches!(result, Err(ExtractionError::PathTraversal { .. })),
        "got {result:?}"
    );
    assert!(!outside.path().join("evil").exists());
}

#[test]
fn empty_archive_is_rejected() {
    let (_temp, result) = extract_entries(&[]);
    assert!(matches!(result, Err(ExtractionError::EmptyArchive)));
}

#[test]
fn corrupt_archive_is_an_io_error() {
    let temp = tempfile::tempdir().expect("temp dir");
    let archive = temp.path().join("firefox-128.0.tar.xz");
    fs::write(&archive, b"not xz data").expect("write");

    let result = TarXzExtractor.extract(&archive, temp.path());
    assert!(matches!(result, Err(ExtractionError::Io(_))), "got {result:?}");
}

#[test]
fn unpack_reads_plain_tar_streams() {
    let tar = write_tar(Vec::new(), &[ArchiveEntry::file("a.txt", b"a", 0o644)])
        .expect("write tar");
    let dest = tempfile::tempdir().expect("temp dir");

    let summary = unpack(tar.as_slice(), dest.path()).expect("unpack");
    assert_eq!(summary.files, 1);
    assert_eq!(fs::read(dest.path().join("a.txt")).expect("read"), b"a");
}

#[test]
fn file_entry_over_an_archive_symlink_is_rejected() {
    let outside = tempfile::tempdir().expect("outside dir");
    let victim = outside.path().join("victim");
    fs::write(&victim, b"original").expect("write victim");
    let (_temp, result) = extract_entries(&[
        ArchiveEntry::symlink("firefox-bin", &victim.display().to_string()),
        ArchiveEntry::file("firefox-bin", b"owned", 0o644),
    ]);

    assert!(
        matches!(result, Err(ExtractionError::PathTraversal { .. })),
        "got {result:?}"
    );
    assert_eq!(fs::read(&victim).expect("read victim"), b"original");
}

#[cfg(unix)]
#[test]
fn directory_entry_over_an_archive_symlink_is_rejected() {
    use std::os::unix::fs::PermissionsExt;

    let outside = tempfile::tempdir().expect("outside dir");
    let victim = outside.path().join("private");
    fs::create_dir(&victim).expect("create victim");
    fs::set_permissions(&victim, fs::Permissions::from_mode(0o700)).expect("chmod victim");
    let (_temp, result) = extract_entries(&[
        ArchiveEntry::symlink("firefox", &victim.display().to_string()),
        ArchiveEntry::dir("firefox"),
    ]);

    assert!(
        matches!(result, Err(ExtractionError::PathTraversal { .. })),
        "got {result:?}"
    );
    let mode = fs::metadata(&victim).expect("metadata").permissions().mode();
    assert_eq!(mode & 0o777, 0o700);
}

#[test]
fn concatenated_xz_streams_are_read_to_the_end() {
    use std::io::Write;

    let tar = write_tar(
        Vec::new(),
        &[
            ArchiveEntry::file("firefox/first", b"one", 0o644),
            ArchiveEntry::file("firefox/second", b"two", 0o644),
        ],
    )
    .expect("write tar");
    let (head, tail) = tar.split_at(512 * 2);
    let mut compressed = Vec::new();
    for part in [head, tail] {
        let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
        encoder.write_all(part).expect("compress");
        compressed.extend(encoder.finish().expect("finish stream"));
    }
    let temp = tempfile::tempdir().expect("temp dir");
    let archive = temp.path().join("firefox-128.0.tar.xz");
    fs::write(&archive, compressed).expect("write archive");
    let dest = temp.path().join("out");
    fs::create_dir(&dest).expect("create dest");

    let summary = TarXzExtractor.extract(&archive, &dest).expect("extract");
    assert_eq!(summary.files, 2);
    assert_eq!(fs::read(dest.join("firefox/second")).expect("read"), b"two");
}
