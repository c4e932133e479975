//! Archive extraction and atomic installation.

pub mod extraction;
pub mod swap;

pub use extraction::{ArchiveExtractor, ExtractionError, ExtractionSummary, TarXzExtractor};
pub use swap::{AtomicInstaller, InstalledTree, StagedInstall, SwapError};
