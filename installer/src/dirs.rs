//! Directory resolution abstraction for platform-specific paths.
//!
//! The per-user cache directory comes from the platform base directories
//! (`$XDG_CACHE_HOME`, falling back to `~/.cache`) unless the configuration
//! overrides it. The [`BaseDirs`] trait lets tests substitute a temporary
//! directory.

use crate::config::Config;
use std::path::{Path, PathBuf};

/// Name of the application subdirectory inside the platform cache directory.
pub const APP_DIR_NAME: &str = "ffpkg";

/// Owner-only permissions for the per-user cache directory.
pub const CACHE_DIR_MODE: u32 = 0o700;

/// World-readable permissions for system-wide directories.
pub const SYSTEM_DIR_MODE: u32 = 0o755;

/// Platform base directory lookup.
pub trait BaseDirs {
    /// Return the platform cache directory, if one can be determined.
    fn cache_dir(&self) -> Option<PathBuf>;
}

/// Base directories resolved from the host environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn cache_dir(&self) -> Option<PathBuf> {
        directories_next::BaseDirs::new().map(|dirs| dirs.cache_dir().to_path_buf())
    }
}

/// Return the cache directory for this configuration.
///
/// The configured override wins; otherwise the application subdirectory of
/// the platform cache directory is used.
#[must_use]
pub fn resolve_cache_dir(config: &Config, dirs: &dyn BaseDirs) -> Option<PathBuf> {
    if let Some(dir) = &config.cache_dir {
        return Some(dir.as_std_path().to_path_buf());
    }
    dirs.cache_dir().map(|base| base.join(APP_DIR_NAME))
}

/// Create `path` and any missing parents, applying `mode` to newly created
/// directories on Unix.
///
/// # Errors
///
/// Returns any I/O error from directory creation.
pub fn ensure_dir(path: &Path, mode: u32) -> std::io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(path)
}
