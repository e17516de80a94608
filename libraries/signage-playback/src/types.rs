//! Core types for playlist management

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// One playable media file
///
/// Identity is the path. Entries are rebuilt from disk on every scan and never
/// mutated afterwards, so the fields are only reachable through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaEntry {
    path: PathBuf,
    file_name: String,
    size: u64,
    extension: String,
    modified: Option<DateTime<Utc>>,
    is_valid: bool,
}

impl MediaEntry {
    /// Build an entry from explicit metadata
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: Option<DateTime<Utc>>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = extension_of(&path).unwrap_or_default();

        Self {
            path,
            file_name,
            size,
            extension,
            modified,
            is_valid: true,
        }
    }

    /// Build an entry by reading size and modification time from disk
    ///
    /// Metadata failures do not abort: the entry gets a zero size, no
    /// timestamp, and is flagged invalid.
    pub fn probe(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match std::fs::metadata(&path) {
            Ok(meta) => {
                let modified = meta.modified().ok().map(DateTime::<Utc>::from);
                Self::new(path, meta.len(), modified)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot read media metadata");
                let mut entry = Self::new(path, 0, None);
                entry.is_valid = false;
                entry
            }
        }
    }

    /// Absolute path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name component of the path
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// File size in bytes at scan time
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Lower-cased extension including the leading dot (e.g. `.mp4`)
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Last modification time at scan time
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    /// Whether metadata could be read when the entry was built
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Playlist ordering: case-insensitive file name, then raw name for ties
    pub fn playlist_order(a: &Self, b: &Self) -> Ordering {
        a.file_name
            .to_lowercase()
            .cmp(&b.file_name.to_lowercase())
            .then_with(|| a.file_name.cmp(&b.file_name))
    }
}

/// Lower-cased extension of a path with a leading dot
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
}

/// Playlist ordering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Ascending file-name order
    Sequential,

    /// Random order, every entry once per pass, no immediate repeats
    Shuffle,
}

/// Snapshot of playlist state for status reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistSummary {
    pub total_entries: usize,
    pub current_index: usize,
    pub shuffle_enabled: bool,
    pub loop_enabled: bool,
    pub is_empty: bool,
    pub current_entry: Option<String>,
}
