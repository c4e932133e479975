//! CLI argument definitions for ffpkg.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Fetch, verify, and atomically install signed Firefox builds.
#[derive(Parser, Debug)]
#[command(name = "ffpkg")]
#[command(version, about)]
#[command(long_about = concat!(
    "Fetch, verify, and atomically install signed Firefox builds.\n\n",
    "`fetch` resolves the release permalink, downloads the archive and its detached ",
    "signature into the per-user cache, checks the signature with GnuPG, and records ",
    "the result. `install` extracts the verified archive beside the install directory ",
    "and swaps it into place, then promotes the record to the system state directory.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Download and verify the latest Developer Edition:\n",
    "    $ ffpkg fetch\n\n",
    "  Check a downloaded archive by hand:\n",
    "    $ ffpkg verify --tarball firefox-128.0.tar.xz --sig firefox-128.0.tar.xz.asc\n\n",
    "  Install from the cache (usually as root):\n",
    "    $ sudo ffpkg install --cache ~/.cache/ffpkg\n\n",
    "  Show what is installed:\n",
    "    $ ffpkg status --json",
))]
pub struct Cli {
    /// Read configuration from FILE instead of /etc/ffpkg/config.toml.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        global = true,
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, global = true, conflicts_with = "verbosity")]
    pub quiet: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Download and verify the latest release into the cache.
    Fetch,

    /// Verify a downloaded archive against its detached signature.
    Verify(VerifyArgs),

    /// Install the verified archive from a cache directory.
    Install(InstallArgs),

    /// Show the installed release.
    Status(StatusArgs),
}

/// Arguments for the verify command.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct VerifyArgs {
    /// The `.tar.xz` archive to check.
    #[arg(long, value_name = "PATH")]
    pub tarball: Utf8PathBuf,

    /// The detached `.asc` signature for the archive.
    #[arg(long, value_name = "PATH")]
    pub sig: Utf8PathBuf,
}

/// Arguments for the install command.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct InstallArgs {
    /// Cache directory written by a previous `fetch`.
    #[arg(long, value_name = "DIR")]
    pub cache: Utf8PathBuf,
}

/// Arguments for the status command.
#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusArgs {
    /// Output in JSON format for scripting.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Return the log filter directive implied by `-v`/`-q`.
    ///
    /// # Examples
    ///
    /// ```
    /// use clap::Parser;
    /// use ffpkg::cli::Cli;
    ///
    /// let cli = Cli::parse_from(["ffpkg", "-vv", "fetch"]);
    /// assert_eq!(cli.log_level(), "trace");
    /// ```
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbosity {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
