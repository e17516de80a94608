//! Playlist manager - playlist plus active selection policy
//!
//! Every content mutation and every selection goes through one
//! `PlaylistManager`, so callers that share it behind a single lock get
//! atomic reloads with respect to `next_entry`.

use crate::{
    error::{PlaylistError, Result},
    filter::ExtensionFilter,
    playlist::Playlist,
    policy::{SelectionPolicy, SelectionStrategy},
    types::{MediaEntry, PlaylistSummary, SelectionMode},
};
use std::path::Path;
use tracing::{debug, info, warn};

/// Playlist manager
#[derive(Debug, Clone)]
pub struct PlaylistManager {
    playlist: Playlist,
    policy: SelectionPolicy,
}

impl Default for PlaylistManager {
    fn default() -> Self {
        Self::new(SelectionMode::Sequential, true)
    }
}

impl PlaylistManager {
    /// Create an empty manager
    pub fn new(mode: SelectionMode, loop_enabled: bool) -> Self {
        let mut playlist = Playlist::new();
        playlist.set_loop_enabled(loop_enabled);
        playlist.set_shuffle_enabled(mode == SelectionMode::Shuffle);

        Self {
            playlist,
            policy: SelectionPolicy::for_mode(mode),
        }
    }

    /// Use a specific policy instance (e.g. a seeded shuffle)
    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.playlist
            .set_shuffle_enabled(policy.mode() == SelectionMode::Shuffle);
        self.policy = policy;
        self.policy.reset(&mut self.playlist);
        self
    }

    /// Replace the playlist with freshly scanned entries
    ///
    /// Entries are sorted into playlist order, the cursor goes back to `0`
    /// and the policy state is cleared. Returns the entry count.
    pub fn load(&mut self, mut entries: Vec<MediaEntry>) -> usize {
        entries.sort_by(MediaEntry::playlist_order);
        let count = entries.len();

        self.playlist.replace_entries(entries);
        self.policy.reset(&mut self.playlist);

        debug!(count, "Playlist replaced");
        count
    }

    /// Entry at the cursor
    pub fn current_entry(&self) -> Option<&MediaEntry> {
        self.playlist.current_entry()
    }

    /// Advance through the active policy
    pub fn next_entry(&mut self) -> Option<MediaEntry> {
        self.policy.next(&mut self.playlist)
    }

    /// Switch between shuffle and sequential order
    pub fn set_shuffle(&mut self, enabled: bool) {
        let mode = if enabled {
            SelectionMode::Shuffle
        } else {
            SelectionMode::Sequential
        };

        self.playlist.set_shuffle_enabled(enabled);
        self.policy = SelectionPolicy::for_mode(mode);
        self.policy.reset(&mut self.playlist);

        info!(?mode, "Selection mode changed");
    }

    pub fn set_loop(&mut self, enabled: bool) {
        self.playlist.set_loop_enabled(enabled);
        info!(enabled, "Loop mode changed");
    }

    /// Back to the first entry with fresh policy state
    pub fn reset(&mut self) {
        self.policy.reset(&mut self.playlist);
        info!("Playlist reset");
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.playlist.clear();
        self.policy.reset(&mut self.playlist);
        info!("Playlist cleared");
    }

    /// Append a single file without a rescan
    pub fn add_entry(&mut self, path: &Path, filter: &ExtensionFilter) -> Result<()> {
        if !path.exists() {
            warn!(path = %path.display(), "Cannot add missing media file");
            return Err(PlaylistError::FileNotFound(path.to_path_buf()));
        }

        if !filter.matches(path) {
            let ext = crate::types::extension_of(path).unwrap_or_default();
            warn!(path = %path.display(), "Unsupported media format");
            return Err(PlaylistError::UnsupportedFormat(ext));
        }

        let entry = MediaEntry::probe(path);
        info!(file = entry.file_name(), "Entry added to playlist");
        self.playlist.add_entry(entry);
        Ok(())
    }

    /// Remove a single file without a rescan
    pub fn remove_entry(&mut self, path: &Path) -> Result<MediaEntry> {
        match self.playlist.remove_entry(path) {
            Some(entry) => {
                info!(file = entry.file_name(), "Entry removed from playlist");
                Ok(entry)
            }
            None => {
                warn!(path = %path.display(), "Entry not in playlist");
                Err(PlaylistError::EntryNotFound(path.to_path_buf()))
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.playlist.is_empty()
    }

    pub fn len(&self) -> usize {
        self.playlist.len()
    }

    pub fn loop_enabled(&self) -> bool {
        self.playlist.loop_enabled()
    }

    pub fn mode(&self) -> SelectionMode {
        self.policy.mode()
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn entry_names(&self) -> Vec<String> {
        self.playlist.entry_names()
    }

    /// Status snapshot
    pub fn summary(&self) -> PlaylistSummary {
        PlaylistSummary {
            total_entries: self.playlist.len(),
            current_index: self.playlist.cursor(),
            shuffle_enabled: self.playlist.shuffle_enabled(),
            loop_enabled: self.playlist.loop_enabled(),
            is_empty: self.playlist.is_empty(),
            current_entry: self
                .playlist
                .current_entry()
                .map(|e| e.file_name().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ShuffleNoRepeat;
    use std::fs;
    use tempfile::TempDir;

    fn entries(names: &[&str]) -> Vec<MediaEntry> {
        names
            .iter()
            .map(|n| MediaEntry::new(format!("/videos/{n}"), 10, None))
            .collect()
    }

    #[test]
    fn load_sorts_and_resets() {
        let mut manager = PlaylistManager::default();
        let count = manager.load(entries(&["c.mp4", "A.mp4", "b.mp4"]));

        assert_eq!(count, 3);
        assert_eq!(manager.entry_names(), vec!["A.mp4", "b.mp4", "c.mp4"]);
        assert_eq!(manager.current_entry().unwrap().file_name(), "A.mp4");
    }

    #[test]
    fn reload_clears_shuffle_state() {
        let mut manager = PlaylistManager::default()
            .with_policy(SelectionPolicy::Shuffle(ShuffleNoRepeat::with_seed(1)));
        manager.load(entries(&["a.mp4", "b.mp4", "c.mp4"]));
        manager.next_entry();
        manager.next_entry();

        manager.load(entries(&["a.mp4", "b.mp4", "c.mp4"]));
        assert_eq!(manager.playlist().cursor(), 0);
        match &manager.policy {
            SelectionPolicy::Shuffle(shuffle) => {
                assert_eq!(shuffle.played_count(), 0);
                assert!(shuffle.last_index().is_none());
            }
            SelectionPolicy::Sequential(_) => panic!("expected shuffle policy"),
        }
    }

    #[test]
    fn toggling_shuffle_resets_cursor() {
        let mut manager = PlaylistManager::default();
        manager.load(entries(&["a.mp4", "b.mp4", "c.mp4"]));
        manager.next_entry();
        assert_eq!(manager.playlist().cursor(), 1);

        manager.set_shuffle(true);
        assert_eq!(manager.mode(), SelectionMode::Shuffle);
        assert!(manager.summary().shuffle_enabled);
        assert_eq!(manager.playlist().cursor(), 0);

        manager.set_shuffle(false);
        assert_eq!(manager.mode(), SelectionMode::Sequential);
    }

    #[test]
    fn summary_reports_current_entry() {
        let mut manager = PlaylistManager::default();
        let empty = manager.summary();
        assert!(empty.is_empty);
        assert!(empty.current_entry.is_none());

        manager.load(entries(&["a.mp4", "b.mp4"]));
        manager.next_entry();
        let summary = manager.summary();
        assert_eq!(summary.total_entries, 2);
        assert_eq!(summary.current_index, 1);
        assert_eq!(summary.current_entry.as_deref(), Some("b.mp4"));
        assert!(summary.loop_enabled);
    }

    #[test]
    fn add_entry_validates_file() {
        let temp = TempDir::new().unwrap();
        let video = temp.path().join("new.mp4");
        let text = temp.path().join("notes.txt");
        fs::write(&video, b"video").unwrap();
        fs::write(&text, b"text").unwrap();

        let filter = ExtensionFilter::default();
        let mut manager = PlaylistManager::default();

        manager.add_entry(&video, &filter).unwrap();
        assert_eq!(manager.len(), 1);

        assert!(matches!(
            manager.add_entry(&text, &filter),
            Err(PlaylistError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            manager.add_entry(&temp.path().join("gone.mp4"), &filter),
            Err(PlaylistError::FileNotFound(_))
        ));
    }

    #[test]
    fn remove_entry_reports_missing() {
        let mut manager = PlaylistManager::default();
        manager.load(entries(&["a.mp4"]));

        assert!(manager.remove_entry(Path::new("/videos/a.mp4")).is_ok());
        assert!(matches!(
            manager.remove_entry(Path::new("/videos/a.mp4")),
            Err(PlaylistError::EntryNotFound(_))
        ));
    }

    #[test]
    fn clear_empties_playlist() {
        let mut manager = PlaylistManager::default();
        manager.load(entries(&["a.mp4", "b.mp4"]));
        manager.clear();
        assert!(manager.is_empty());
        assert!(manager.current_entry().is_none());
    }
}
