//! Release resolution and download over HTTP.
//!
//! Provides a trait-based abstraction for following the release permalink and
//! streaming release files, so the fetch pipeline can be exercised without
//! network access.

use crate::config::NetworkConfig;
use log::debug;
use std::path::Path;
use ureq::ResponseExt;

/// Trait for resolving and downloading release files.
///
/// # Examples
///
/// ```
/// use ffpkg::config::NetworkConfig;
/// use ffpkg::release::source::HttpReleaseSource;
///
/// let source = HttpReleaseSource::new(&NetworkConfig::default());
/// // Use source.resolve_latest_url(permalink) in production
/// # let _ = source;
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ReleaseSource {
    /// Follow every redirect from `permalink` and return the final URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the permalink cannot be reached.
    fn resolve_latest_url(&self, permalink: &str) -> Result<String, DownloadError>;

    /// Stream the body at `url` into the file at `dest`, truncating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or file write fails.
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError>;
}

/// Errors arising from release resolution and download.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP request failed.
    #[error("download failed for {url}: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested file was not found (HTTP 404).
    #[error("release file not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP-based release source using `ureq`.
#[derive(Debug, Clone)]
pub struct HttpReleaseSource {
    agent: ureq::Agent,
}

impl HttpReleaseSource {
    /// Build a source whose agent applies the configured timeouts.
    #[must_use]
    pub fn new(network: &NetworkConfig) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(network.connect_timeout()))
            .timeout_recv_response(Some(network.response_timeout()))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl ReleaseSource for HttpReleaseSource {
    fn resolve_latest_url(&self, permalink: &str) -> Result<String, DownloadError> {
        let response = self
            .agent
            .get(permalink)
            .call()
            .map_err(|e| map_ureq_error(permalink, &e))?;
        // The body is the artifact itself; only the final location matters.
        let resolved = response.get_uri().to_string();
        debug!("permalink {permalink} resolved to {resolved}");
        Ok(resolved)
    }

    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut file = std::fs::File::create(dest)?;
        let bytes = std::io::copy(&mut response.into_body().as_reader(), &mut file)
            .map_err(DownloadError::Io)?;
        debug!("downloaded {bytes} bytes from {url} to {}", dest.display());
        Ok(())
    }
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        other => DownloadError::HttpError {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
