//! Error types for directory scanning and watching

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("Watcher error: {0}")]
    Watch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
