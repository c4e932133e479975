//! Release discovery: permalink resolution and artifact naming.
//!
//! - [`artifact`] - Parsing `<name>-<version>.tar.xz` release URLs.
//! - [`source`] - Permalink resolution and file download over HTTP.

pub mod artifact;
pub mod source;
