//! Reading and writing `state.json` in the cache and state directories.
//!
//! The per-user cache holds the record for the most recent fetch. After a
//! successful install the same bytes are promoted into the system-wide state
//! directory. Every write goes through [`super::durable`], so a crash leaves
//! either the previous record or the new one.

use super::durable::{copy_durably, write_durably};
use super::record::InstallState;
use crate::release::artifact::ReleaseArtifact;
use crate::verification::trust::TrustRecord;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the install record in both directories.
pub const STATE_FILENAME: &str = "state.json";

/// Errors arising from state persistence.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// No record exists at the expected path.
    #[error("no install record at {path}")]
    Missing {
        /// The absent state file.
        path: PathBuf,
    },

    /// The record could not be read or written.
    #[error("state I/O failed for {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The record is not valid JSON of the expected shape.
    #[error("malformed install record {path}: {source}")]
    Malformed {
        /// The state file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// Persists [`InstallState`] records.
#[derive(Debug, Clone)]
pub struct StateStore {
    cache_dir: PathBuf,
    state_dir: PathBuf,
    install_dir: PathBuf,
}

impl StateStore {
    /// Create a store over the given directories.
    #[must_use]
    pub fn new(cache_dir: &Path, state_dir: &Path, install_dir: &Path) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
            state_dir: state_dir.to_path_buf(),
            install_dir: install_dir.to_path_buf(),
        }
    }

    /// Return the path of the cached record.
    #[must_use]
    pub fn cached_path(&self) -> PathBuf {
        self.cache_dir.join(STATE_FILENAME)
    }

    /// Return the path of the system-wide record.
    #[must_use]
    pub fn installed_path(&self) -> PathBuf {
        self.state_dir.join(STATE_FILENAME)
    }

    /// Write the cached record for a freshly verified artifact.
    ///
    /// The previous cached record is replaced wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if the durable write fails.
    pub fn record_fetch_state(
        &self,
        artifact: &ReleaseArtifact,
        trust: &TrustRecord,
    ) -> Result<InstallState, StateError> {
        let state = InstallState::new(artifact, &self.install_dir, trust.clone());
        let path = self.cached_path();
        let mut json =
            serde_json::to_vec_pretty(&state).map_err(|source| StateError::Malformed {
                path: path.clone(),
                source,
            })?;
        json.push(b'\n');
        write_durably(&path, &json).map_err(|source| StateError::Io {
            path: path.clone(),
            source,
        })?;
        debug!("recorded {} {} in {}", state.name(), state.version(), path.display());
        Ok(state)
    }

    /// Read the cached record written by the last fetch.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Missing`] when nothing has been fetched yet.
    pub fn load_cached(&self) -> Result<InstallState, StateError> {
        read_state(&self.cached_path())
    }

    /// Read the system-wide record, if an install has completed.
    ///
    /// # Errors
    ///
    /// Returns an I/O or parse error when the record exists but is unusable.
    pub fn load_installed(&self) -> Result<Option<InstallState>, StateError> {
        load_installed(&self.state_dir)
    }

    /// Promote the cached record into the state directory.
    ///
    /// # Errors
    ///
    /// See [`promote_state`].
    pub fn promote(&self) -> Result<InstallState, StateError> {
        promote_state(&self.cache_dir, &self.state_dir)
    }
}

/// Copy `<cache_dir>/state.json` durably to `<state_dir>/state.json`.
///
/// The cached record must parse before anything is written, so a corrupt
/// cache never replaces a good system record.
///
/// # Errors
///
/// Returns [`StateError::Missing`] or [`StateError::Malformed`] for an
/// unusable cached record, or [`StateError::Io`] if the copy fails.
pub fn promote_state(cache_dir: &Path, state_dir: &Path) -> Result<InstallState, StateError> {
    let source = cache_dir.join(STATE_FILENAME);
    let destination = state_dir.join(STATE_FILENAME);
    let state = read_state(&source)?;

    copy_durably(&source, &destination).map_err(|source| StateError::Io {
        path: destination.clone(),
        source,
    })?;
    info!("promoted install record to {}", destination.display());
    Ok(state)
}

/// Read `<state_dir>/state.json`, returning `None` before the first install.
///
/// # Errors
///
/// Returns an I/O or parse error when the record exists but is unusable.
pub fn load_installed(state_dir: &Path) -> Result<Option<InstallState>, StateError> {
    match read_state(&state_dir.join(STATE_FILENAME)) {
        Ok(state) => Ok(Some(state)),
        Err(StateError::Missing { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Read and parse an install record.
///
/// # Errors
///
/// Returns [`StateError::Missing`] when `path` does not exist, otherwise an
/// I/O or parse error.
pub fn read_state(path: &Path) -> Result<InstallState, StateError> {
    let contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StateError::Missing {
                path: path.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(StateError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_slice(&contents).map_err(|source| StateError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::trust::VerificationMethod;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct Dirs {
        _root: TempDir,
        cache: PathBuf,
        state: PathBuf,
        store: StateStore,
    }

    #[fixture]
    fn dirs() -> Dirs {
        let root = tempfile::tempdir().expect("temp dir");
        let cache = root.path().join("cache");
        let state = root.path().join("state");
        fs::create_dir_all(&cache).expect("cache dir");
        fs::create_dir_all(&state).expect("state dir");
        let store = StateStore::new(&cache, &state, Path::new("/opt/firefox"));
        Dirs {
            _root: root,
            cache,
            state,
            store,
        }
    }

    fn artifact(version: &str) -> ReleaseArtifact {
        ReleaseArtifact::parse(&format!(
            "https://example.invalid/firefox-{version}.tar.xz"
        ))
        .expect("valid url")
    }

    fn trust() -> TrustRecord {
        TrustRecord::new(VerificationMethod::Gpg, "ABCDEF0123456789")
    }

    #[rstest]
    fn fetch_state_round_trips_through_the_cache(dirs: Dirs) {
        let written = dirs
            .store
            .record_fetch_state(&artifact("128.0"), &trust())
            .expect("record");

        assert_eq!(written.installed_at(), Path::new("/opt/firefox"));
        assert_eq!(dirs.store.load_cached().expect("load"), written);
    }

    #[rstest]
    fn later_fetch_replaces_the_record(dirs: Dirs) {
        dirs.store
            .record_fetch_state(&artifact("128.0"), &trust())
            .expect("first");
        dirs.store
            .record_fetch_state(&artifact("129.0"), &trust())
            .expect("second");

        assert_eq!(dirs.store.load_cached().expect("load").version(), "129.0");
    }

    #[rstest]
    fn promote_copies_the_cached_bytes(dirs: Dirs) {
        dirs.store
            .record_fetch_state(&artifact("128.0"), &trust())
            .expect("record");

        let promoted = dirs.store.promote().expect("promote");
        assert_eq!(promoted.version(), "128.0");
        assert_eq!(
            fs::read(dirs.state.join(STATE_FILENAME)).expect("read installed"),
            fs::read(dirs.cache.join(STATE_FILENAME)).expect("read cached")
        );
        assert_eq!(dirs.store.load_installed().expect("load"), Some(promoted));
    }

    #[rstest]
    fn corrupt_cache_never_replaces_installed_record(dirs: Dirs) {
        fs::write(dirs.state.join(STATE_FILENAME), b"previous").expect("seed installed");
        fs::write(dirs.cache.join(STATE_FILENAME), b"{\"name\":").expect("seed cached");

        let err = promote_state(&dirs.cache, &dirs.state).expect_err("must fail");
        assert!(matches!(err, StateError::Malformed { .. }), "got {err:?}");
        assert_eq!(
            fs::read(dirs.state.join(STATE_FILENAME)).expect("read"),
            b"previous"
        );
    }

    #[rstest]
    fn promote_without_fetch_reports_missing(dirs: Dirs) {
        let err = dirs.store.promote().expect_err("must fail");
        assert!(matches!(err, StateError::Missing { .. }), "got {err:?}");
    }

    #[rstest]
    fn no_install_yet_is_not_an_error(dirs: Dirs) {
        assert_eq!(dirs.store.load_installed().expect("load"), None);
    }
}
