//! Signage Player - Playlist Management
//!
//! Playlist state and ordering policies for unattended looping playback.
//!
//! This crate provides:
//! - Media entries built from files on disk
//! - Playlist with a bounds-checked cursor
//! - Selection policies (Sequential, Shuffle without immediate repeat)
//! - Playlist manager combining the playlist with the active policy
//!
//! # Architecture
//!
//! `signage-playback` has no runtime or filesystem-watching dependencies.
//! Directory scanning lives in `signage-scanner`, the control loop in the
//! `signage-player` application.
//!
//! # Example: Sequential Looping
//!
//! ```rust
//! use signage_playback::{MediaEntry, PlaylistManager, SelectionMode};
//!
//! let mut manager = PlaylistManager::new(SelectionMode::Sequential, true);
//! manager.load(vec![
//!     MediaEntry::new("/videos/1.mp4", 0, None),
//!     MediaEntry::new("/videos/2.mp4", 0, None),
//! ]);
//!
//! assert_eq!(manager.current_entry().unwrap().file_name(), "1.mp4");
//! assert_eq!(manager.next_entry().unwrap().file_name(), "2.mp4");
//! assert_eq!(manager.next_entry().unwrap().file_name(), "1.mp4");
//! ```

mod error;
mod filter;
mod manager;
mod playlist;
pub mod policy;
pub mod types;

// Public exports
pub use error::{PlaylistError, Result};
pub use filter::{ExtensionFilter, DEFAULT_EXTENSIONS};
pub use manager::PlaylistManager;
pub use playlist::Playlist;
pub use policy::{SelectionPolicy, SelectionStrategy, Sequential, ShuffleNoRepeat};
pub use types::{MediaEntry, PlaylistSummary, SelectionMode};
