//! Shared utilities
//!
//! # Modules
//!
//! - [`fs`] - atomic file writes
//! - [`progress`] - progress bars and spinners honouring `SOLKIT_NO_PROGRESS`

pub mod fs;
pub mod progress;

pub use fs::{atomic_write, ensure_dir, safe_write};
pub use progress::{DeployProgressBar, Spinner, is_progress_disabled};
