//! Extension filter for supported media files

use crate::types::extension_of;
use std::collections::BTreeSet;
use std::path::Path;

/// Default video extensions
pub const DEFAULT_EXTENSIONS: &[&str] = &[".mp4", ".avi", ".mkv", ".mov", ".wmv"];

/// Set of allowed extensions, stored lower-cased with a leading dot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    extensions: BTreeSet<String>,
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS.iter().copied())
    }
}

impl ExtensionFilter {
    /// Build a filter from extensions such as `.mp4`
    ///
    /// A missing leading dot is tolerated; validation of the configured list
    /// happens when the configuration is loaded.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().to_lowercase())
            .filter(|ext| !ext.is_empty() && ext != ".")
            .map(|ext| {
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{ext}")
                }
            })
            .collect();

        Self { extensions }
    }

    /// Check if a path has an allowed extension
    pub fn matches(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.extensions.contains(&ext))
    }

    /// Allowed extensions in sorted order
    pub fn extensions(&self) -> Vec<String> {
        self.extensions.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_matches_video_files() {
        let filter = ExtensionFilter::default();
        assert!(filter.matches(Path::new("clip.mp4")));
        assert!(filter.matches(Path::new("clip.MKV")));
        assert!(filter.matches(Path::new("/path/to/clip.wmv")));
        assert!(!filter.matches(Path::new("notes.txt")));
        assert!(!filter.matches(Path::new("clip")));
    }

    #[test]
    fn normalizes_case_and_dot() {
        let filter = ExtensionFilter::new(["MP4", ".Mov", "", "."]);
        assert_eq!(filter.extensions(), vec![".mov".to_string(), ".mp4".to_string()]);
    }
}
