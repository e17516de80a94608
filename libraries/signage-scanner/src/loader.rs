//! Directory loading for video files
//!
//! Only the immediate children of the video directory are considered.

use crate::{error::ScannerError, types::DirectorySummary, Result};
use chrono::{DateTime, Utc};
use signage_playback::{ExtensionFilter, MediaEntry};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Loads the playable entries of one directory
#[derive(Debug, Clone, Default)]
pub struct DirectoryLoader {
    filter: ExtensionFilter,
}

impl DirectoryLoader {
    pub fn new(filter: ExtensionFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &ExtensionFilter {
        &self.filter
    }

    /// Build playlist entries for every matching file in `dir`
    ///
    /// A missing directory yields an empty list. Files whose metadata cannot
    /// be read are still listed, with zero size and no timestamp. The result is
    /// sorted by case-insensitive file name.
    pub fn load_from(&self, dir: &Path) -> Vec<MediaEntry> {
        let mut entries: Vec<MediaEntry> = self
            .matching_files(dir)
            .into_iter()
            .map(|path| {
                let entry = MediaEntry::probe(path);
                tracing::debug!(file = entry.file_name(), "Video loaded");
                entry
            })
            .collect();

        entries.sort_by(MediaEntry::playlist_order);

        tracing::info!(
            count = entries.len(),
            dir = %dir.display(),
            "Loaded videos from directory"
        );
        entries
    }

    /// Paths of matching, non-empty files in `dir`
    ///
    /// Zero-byte files are left out so a file that is still being created does
    /// not show up as a new video.
    pub fn scan_paths(&self, dir: &Path) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .matching_files(dir)
            .into_iter()
            .filter(|path| match std::fs::metadata(path) {
                Ok(meta) => meta.len() > 0,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Cannot access file");
                    false
                }
            })
            .collect();

        paths.sort();
        paths
    }

    fn matching_files(&self, dir: &Path) -> Vec<PathBuf> {
        if !dir.exists() {
            tracing::warn!(dir = %dir.display(), "Video directory does not exist");
            return Vec::new();
        }

        if !dir.is_dir() {
            tracing::error!(dir = %dir.display(), "Video path is not a directory");
            return Vec::new();
        }

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false);

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            let path = entry.path();
            if path.is_file() && self.filter.matches(path) {
                files.push(path.to_path_buf());
            }
        }

        files
    }

    /// Directory status without monitoring information
    pub fn directory_summary(&self, dir: &Path) -> DirectorySummary {
        let mut summary = DirectorySummary {
            path: dir.to_path_buf(),
            exists: dir.exists(),
            supported_formats: self.filter.extensions(),
            directory_size: None,
            last_modified: None,
            is_monitoring: false,
            last_scan_time: None,
            cached_video_count: 0,
        };

        if let Ok(meta) = std::fs::metadata(dir) {
            summary.last_modified = meta.modified().ok().map(DateTime::<Utc>::from);
        }

        if summary.exists {
            let size = WalkDir::new(dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter_map(|e| e.metadata().ok())
                .filter(|meta| meta.is_file())
                .map(|meta| meta.len())
                .sum();
            summary.directory_size = Some(size);
        }

        summary
    }
}

/// Check that `dir` exists, is a directory and can be listed
pub fn validate_directory(dir: &Path) -> Result<()> {
    if !dir.exists() {
        tracing::error!(dir = %dir.display(), "Directory does not exist");
        return Err(ScannerError::DirectoryNotFound(dir.to_path_buf()));
    }

    if !dir.is_dir() {
        tracing::error!(dir = %dir.display(), "Path is not a directory");
        return Err(ScannerError::NotADirectory(dir.to_path_buf()));
    }

    match std::fs::read_dir(dir) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            tracing::error!(dir = %dir.display(), "No permission to list directory");
            Err(ScannerError::PermissionDenied(dir.to_path_buf()))
        }
        Err(e) => {
            tracing::error!(dir = %dir.display(), error = %e, "Cannot list directory");
            Err(ScannerError::Io(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_filters_and_sorts() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();

        fs::write(base.join("b.mp4"), b"fake video").unwrap();
        fs::write(base.join("A.MKV"), b"fake video").unwrap();
        fs::write(base.join("c.avi"), b"fake video").unwrap();
        fs::write(base.join("readme.txt"), b"not video").unwrap();

        let loader = DirectoryLoader::default();
        let entries = loader.load_from(base);

        let names: Vec<_> = entries.iter().map(|e| e.file_name()).collect();
        assert_eq!(names, vec!["A.MKV", "b.mp4", "c.avi"]);
        assert_eq!(entries[0].extension(), ".mkv");
        assert_eq!(entries[1].size(), 10);
    }

    #[test]
    fn test_load_from_is_not_recursive() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();

        fs::write(base.join("top.mp4"), b"fake").unwrap();
        let subdir = base.join("nested.mp4");
        fs::create_dir(&subdir).unwrap();
        fs::write(subdir.join("deep.mp4"), b"fake").unwrap();

        let entries = DirectoryLoader::default().load_from(base);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name(), "top.mp4");
    }

    #[test]
    fn test_load_from_missing_directory() {
        let temp = TempDir::new().unwrap();
        let entries = DirectoryLoader::default().load_from(&temp.path().join("missing"));
        assert!(entries.is_empty());
    }

    #[test]
    fn test_custom_filter() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.mp4"), b"fake").unwrap();
        fs::write(temp.path().join("b.webm"), b"fake").unwrap();

        let loader = DirectoryLoader::new(ExtensionFilter::new([".webm"]));
        let entries = loader.load_from(temp.path());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name(), "b.webm");
    }

    #[test]
    fn test_scan_paths_skips_empty_files() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("full.mp4"), b"fake").unwrap();
        fs::write(temp.path().join("empty.mp4"), b"").unwrap();

        let paths = DirectoryLoader::default().scan_paths(temp.path());
        assert_eq!(paths, vec![temp.path().join("full.mp4")]);
    }

    #[test]
    fn test_validate_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.mp4");
        fs::write(&file, b"fake").unwrap();

        assert!(validate_directory(temp.path()).is_ok());
        assert!(matches!(
            validate_directory(&temp.path().join("missing")),
            Err(ScannerError::DirectoryNotFound(_))
        ));
        assert!(matches!(
            validate_directory(&file),
            Err(ScannerError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_directory_summary() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.mp4"), b"12345").unwrap();
        fs::write(temp.path().join("b.txt"), b"123").unwrap();

        let summary = DirectoryLoader::default().directory_summary(temp.path());
        assert!(summary.exists);
        assert_eq!(summary.directory_size, Some(8));
        assert!(summary.last_modified.is_some());
        assert!(summary.supported_formats.contains(&".mp4".to_string()));
    }
}
