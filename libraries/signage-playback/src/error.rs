//! Error types for playlist management

use std::path::PathBuf;
use thiserror::Error;

/// Playlist errors
#[derive(Debug, Error)]
pub enum PlaylistError {
    /// Media file does not exist
    #[error("Media file not found: {0}")]
    FileNotFound(PathBuf),

    /// Extension is not in the allowed set
    #[error("Unsupported media format: {0}")]
    UnsupportedFormat(String),

    /// Entry is not part of the playlist
    #[error("Entry not in playlist: {0}")]
    EntryNotFound(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for playlist operations
pub type Result<T> = std::result::Result<T, PlaylistError>;
