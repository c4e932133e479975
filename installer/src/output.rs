//! Output formatting for the ffpkg CLI.
//!
//! Progress messages go to stderr through [`write_stderr_line`]. The
//! `status` report is rendered either for people or as JSON for scripts.

use crate::state::InstallState;
use serde::Serialize;
use std::io::Write;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort progress output; ignore write failures.
    }
}

/// Format the install record for human-readable output.
///
/// # Examples
///
/// ```
/// use ffpkg::output::format_status_human;
///
/// let output = format_status_human(None);
/// assert!(output.contains("Nothing installed"));
/// ```
#[must_use]
pub fn format_status_human(state: Option<&InstallState>) -> String {
    let Some(state) = state else {
        return String::from("Nothing installed.\n\nRun `ffpkg fetch` and then `ffpkg install`.");
    };

    format!(
        concat!(
            "{} {}\n",
            "  Installed at: {}\n",
            "  Verified by:  {}",
        ),
        state.name(),
        state.version(),
        state.installed_at().display(),
        state.verified(),
    )
}

/// Format the install record as JSON.
///
/// # Examples
///
/// ```
/// use ffpkg::output::format_status_json;
///
/// let json = format_status_json(None);
/// assert!(json.contains("\"installed\": null"));
/// ```
#[must_use]
pub fn format_status_json(state: Option<&InstallState>) -> String {
    let report = StatusJson { installed: state };
    serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_owned())
}

/// JSON-serialisable status report.
#[derive(Debug, Serialize)]
struct StatusJson<'a> {
    installed: Option<&'a InstallState>,
}
