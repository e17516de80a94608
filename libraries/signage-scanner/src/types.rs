//! Types shared by the loader and the reconciler

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Normalized filesystem event for the watched directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A matching file appeared (created, or renamed into a matching name)
    Created(PathBuf),
    /// A matching file disappeared (deleted, or renamed away from a matching name)
    Deleted(PathBuf),
    /// A matching file was renamed to another matching name
    Moved { from: PathBuf, to: PathBuf },
}

impl WatchEvent {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Created(_) => ChangeKind::Created,
            Self::Deleted(_) => ChangeKind::Deleted,
            Self::Moved { .. } => ChangeKind::Moved,
        }
    }
}

/// What triggered a reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Deleted,
    Moved,
    /// Periodic rescan without a filesystem event
    Poll,
}

/// Net change of the visible media set
///
/// Emitted only when `added` or `removed` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeNotification {
    pub kind: ChangeKind,
    pub added: BTreeSet<PathBuf>,
    pub removed: BTreeSet<PathBuf>,
    pub total: usize,
}

/// Directory information for status reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectorySummary {
    pub path: PathBuf,
    pub exists: bool,
    pub supported_formats: Vec<String>,
    /// Combined size of the files directly inside the directory
    pub directory_size: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
    pub is_monitoring: bool,
    pub last_scan_time: Option<DateTime<Utc>>,
    pub cached_video_count: usize,
}
