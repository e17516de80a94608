//! Signage Player Directory Scanner
//!
//! Keeps the playlist in step with the video directory.
//!
//! # Architecture
//!
//! - `loader`: one-shot, non-recursive directory loading into playlist entries
//! - `watcher`: change reconciler that watches the directory, debounces events
//!   and reports net additions and removals over a channel

mod error;
mod types;

pub mod loader;
pub mod watcher;

pub use error::ScannerError;
pub use loader::{validate_directory, DirectoryLoader};
pub use signage_playback::ExtensionFilter;
pub use types::*;
pub use watcher::ChangeReconciler;

/// Re-export commonly used types
pub type Result<T> = std::result::Result<T, ScannerError>;
