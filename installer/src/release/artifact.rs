//! Release artifact naming.
//!
//! Download URLs for release builds end in `<name>-<version>.tar.xz`. This
//! module extracts those components and rebuilds the cached filename from a
//! recorded name and version.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// The archive suffix every release artifact carries.
pub const ARCHIVE_SUFFIX: &str = ".tar.xz";

/// The suffix appended to an artifact URL or filename for its signature.
pub const SIGNATURE_SUFFIX: &str = ".asc";

/// A release artifact identified from its download URL.
///
/// # Examples
///
/// ```
/// use ffpkg::release::artifact::ReleaseArtifact;
///
/// let artifact = ReleaseArtifact::parse(
///     "https://download.example.test/pub/firefox-128.0.tar.xz",
/// )
/// .expect("URL matches the release pattern");
/// assert_eq!(artifact.name(), "firefox");
/// assert_eq!(artifact.version(), "128.0");
/// assert_eq!(artifact.filename(), "firefox-128.0.tar.xz");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseArtifact {
    url: String,
    filename: String,
    name: String,
    version: String,
}

/// Errors arising from release URL parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArtifactParseError {
    /// The URL does not end in `<name>-<version>.tar.xz`.
    #[error("release URL {url} does not end in <name>-<version>.tar.xz")]
    NoMatch {
        /// The rejected URL.
        url: String,
    },
}

#[expect(clippy::expect_used, reason = "literal pattern is covered by unit tests")]
fn release_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(firefox(?:-developer)?)-([0-9A-Za-z.\-]+)\.tar\.xz$")
            .expect("release pattern compiles")
    })
}

impl ReleaseArtifact {
    /// Parse a release artifact from its download URL.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactParseError::NoMatch`] when the URL does not end in
    /// the release filename pattern.
    pub fn parse(url: &str) -> Result<Self, ArtifactParseError> {
        let no_match = || ArtifactParseError::NoMatch {
            url: url.to_owned(),
        };
        let captures = release_pattern().captures(url).ok_or_else(no_match)?;
        let (Some(filename), Some(name), Some(version)) =
            (captures.get(0), captures.get(1), captures.get(2))
        else {
            return Err(no_match());
        };

        Ok(Self {
            url: url.to_owned(),
            filename: filename.as_str().to_owned(),
            name: name.as_str().to_owned(),
            version: version.as_str().to_owned(),
        })
    }

    /// Rebuild the archive filename for a recorded name and version.
    #[must_use]
    pub fn filename_for(name: &str, version: &str) -> String {
        format!("{name}-{version}{ARCHIVE_SUFFIX}")
    }

    /// Return the full download URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Return the URL of the detached signature.
    #[must_use]
    pub fn signature_url(&self) -> String {
        format!("{}{SIGNATURE_SUFFIX}", self.url)
    }

    /// Return the archive filename, e.g. `firefox-128.0.tar.xz`.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Return the filename the detached signature is cached under.
    #[must_use]
    pub fn signature_filename(&self) -> String {
        format!("{}{SIGNATURE_SUFFIX}", self.filename)
    }

    /// Return the product name, e.g. `firefox-developer`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the release version, e.g. `121.0a1`.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for ReleaseArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}
