//! Runtime configuration for the fetch, verify, and install commands.
//!
//! Every component receives its permalink, directories, and timeouts from a
//! [`Config`] value rather than from constants, so tests can point the
//! pipeline at temporary directories and stub endpoints. Values are read from
//! a TOML file when one is present and fall back to the defaults below
//! otherwise.

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use serde::Deserialize;
use std::time::Duration;

/// The system-wide configuration file consulted when `--config` is absent.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ffpkg/config.toml";

const DEFAULT_PERMALINK: &str =
    "https://download.mozilla.org/?product=firefox-devedition-latest&os=linux64&lang=en-US";
const DEFAULT_STATE_DIR: &str = "/var/lib/ffpkg";
const DEFAULT_INSTALL_DIR: &str = "/opt/firefox-developer-edition";

/// Top-level configuration.
///
/// # Examples
///
/// ```
/// use ffpkg::config::Config;
///
/// let config = Config::from_toml_str("install_dir = \"/opt/firefox\"")
///     .expect("valid configuration");
/// assert_eq!(config.install_dir.as_str(), "/opt/firefox");
/// assert_eq!(config.verifier.program, "gpg");
/// ```
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Stable URL that redirects to the current release archive.
    pub permalink: String,
    /// Per-user cache directory override. When unset the platform cache
    /// directory (`$XDG_CACHE_HOME/ffpkg` or `~/.cache/ffpkg`) is used.
    pub cache_dir: Option<Utf8PathBuf>,
    /// Directory holding the system-wide install record.
    pub state_dir: Utf8PathBuf,
    /// Directory the release tree is installed into.
    pub install_dir: Utf8PathBuf,
    /// HTTP client settings.
    pub network: NetworkConfig,
    /// Signature verification settings.
    pub verifier: VerifierConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            permalink: DEFAULT_PERMALINK.to_owned(),
            cache_dir: None,
            state_dir: Utf8PathBuf::from(DEFAULT_STATE_DIR),
            install_dir: Utf8PathBuf::from(DEFAULT_INSTALL_DIR),
            network: NetworkConfig::default(),
            verifier: VerifierConfig::default(),
        }
    }
}

/// HTTP timeouts applied to permalink resolution and downloads.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Seconds allowed to establish a connection.
    pub connect_timeout_secs: u64,
    /// Seconds allowed between sending a request and receiving its headers.
    pub response_timeout_secs: u64,
}

impl NetworkConfig {
    /// Return the connection timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Return the response header timeout.
    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            response_timeout_secs: 60,
        }
    }
}

/// Settings for the external signature verification tool.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct VerifierConfig {
    /// Program invoked as `<program> --verify <signature> <artifact>`.
    pub program: String,
    /// Seconds the program may run before it is killed.
    pub timeout_secs: u64,
}

impl VerifierConfig {
    /// Return the verification timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            program: "gpg".to_owned(),
            timeout_secs: 120,
        }
    }
}

/// Errors arising from configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    Read {
        /// Path of the unreadable file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`Config`].
    #[error("invalid configuration {path}: {reason}")]
    Parse {
        /// Path of the invalid file.
        path: Utf8PathBuf,
        /// Description of the parse error.
        reason: String,
    },
}

impl Config {
    /// Load configuration from an explicit path, or from
    /// [`DEFAULT_CONFIG_PATH`] when it exists, or fall back to defaults.
    ///
    /// An explicit path must exist; the default path is optional.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the chosen file cannot be read or parsed.
    pub fn load(explicit: Option<&Utf8Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Utf8Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    debug!("no configuration at {default_path}; using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        debug!("loading configuration from {path}");
        Self::from_toml_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML deserialisation error for malformed input or
    /// unknown keys.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn empty_document_yields_defaults() {
        let config = Config::from_toml_str("").expect("empty TOML is valid");
        assert_eq!(config, Config::default());
        assert_eq!(config.state_dir.as_str(), DEFAULT_STATE_DIR);
        assert_eq!(config.install_dir.as_str(), DEFAULT_INSTALL_DIR);
        assert!(config.cache_dir.is_none());
    }

    #[test]
    fn nested_tables_override_individual_fields() {
        let config = Config::from_toml_str(concat!(
            "cache_dir = \"/tmp/ffpkg-cache\"\n",
            "[network]\n",
            "connect_timeout_secs = 5\n",
            "[verifier]\n",
            "program = \"/usr/bin/gpgv\"\n",
        ))
        .expect("valid TOML");

        assert_eq!(
            config.cache_dir.as_deref(),
            Some(Utf8Path::new("/tmp/ffpkg-cache"))
        );
        assert_eq!(config.network.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.network.response_timeout(), Duration::from_secs(60));
        assert_eq!(config.verifier.program, "/usr/bin/gpgv");
        assert_eq!(config.verifier.timeout(), Duration::from_secs(120));
    }

    #[rstest]
    #[case::unknown_top_level("mirror = \"https://example.test\"")]
    #[case::unknown_nested("[verifier]\nkeyring = \"/tmp/keys\"")]
    #[case::wrong_type("state_dir = 7")]
    fn rejects_invalid_documents(#[case] contents: &str) {
        assert!(Config::from_toml_str(contents).is_err());
    }

    #[test]
    fn explicit_missing_file_is_a_read_error() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(temp.path().join("absent.toml")).expect("UTF-8 path");

        let err = Config::load(Some(&path)).expect_err("missing explicit config must fail");
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn from_file_reports_parse_errors_with_path() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(temp.path().join("config.toml")).expect("UTF-8 path");
        std::fs::write(&path, "permalink = [").expect("write config");

        let err = Config::from_file(&path).expect_err("malformed config must fail");
        match err {
            ConfigError::Parse { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn from_file_reads_overrides() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(temp.path().join("config.toml")).expect("UTF-8 path");
        std::fs::write(&path, "state_dir = \"/srv/ffpkg/state\"\n").expect("write config");

        let config = Config::from_file(&path).expect("config loads");
        assert_eq!(config.state_dir.as_str(), "/srv/ffpkg/state");
    }
}
