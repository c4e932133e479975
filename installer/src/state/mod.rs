//! Durable install records.

pub mod durable;
pub mod record;
pub mod store;

pub use record::InstallState;
pub use store::{STATE_FILENAME, StateError, StateStore, load_installed, promote_state};
