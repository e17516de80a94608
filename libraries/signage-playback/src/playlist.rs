//! Playlist state
//!
//! Holds the ordered entries and a cursor. The playlist owns no ordering
//! policy; selection policies move the cursor through `advance_to_index`.

use crate::types::MediaEntry;
use std::path::Path;

/// Ordered media entries plus a cursor
///
/// Invariant: the cursor is in `[0, len)` while the playlist is non-empty and
/// is `0` when it is empty.
#[derive(Debug, Clone)]
pub struct Playlist {
    entries: Vec<MediaEntry>,
    cursor: usize,
    loop_enabled: bool,
    shuffle_enabled: bool,
}

impl Default for Playlist {
    fn default() -> Self {
        Self::new()
    }
}

impl Playlist {
    /// Create an empty playlist with looping enabled
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            loop_enabled: true,
            shuffle_enabled: false,
        }
    }

    /// Entry at the cursor
    pub fn current_entry(&self) -> Option<&MediaEntry> {
        self.entries.get(self.cursor)
    }

    /// Move the cursor
    ///
    /// Reserved for selection policies. Out-of-range indices reset to `0`.
    pub(crate) fn advance_to_index(&mut self, index: usize) {
        self.cursor = if index < self.entries.len() { index } else { 0 };
    }

    /// Replace all entries, cursor back to `0`
    ///
    /// Entries are expected in playlist order (see `MediaEntry::playlist_order`).
    pub fn replace_entries(&mut self, entries: Vec<MediaEntry>) {
        self.entries = entries;
        self.cursor = 0;
    }

    /// Append a single entry without a rescan
    pub fn add_entry(&mut self, entry: MediaEntry) {
        self.entries.push(entry);
    }

    /// Remove a single entry by path
    ///
    /// Keeps the cursor on the same entry when an earlier one is removed and
    /// resets it to `0` when the current entry itself is removed.
    pub fn remove_entry(&mut self, path: &Path) -> Option<MediaEntry> {
        let index = self.entries.iter().position(|e| e.path() == path)?;

        if index < self.cursor {
            self.cursor -= 1;
        } else if index == self.cursor {
            self.cursor = 0;
        }

        let removed = self.entries.remove(index);

        if self.cursor >= self.entries.len() {
            self.cursor = 0;
        }

        Some(removed)
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Current cursor position
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Entry at index
    pub fn get(&self, index: usize) -> Option<&MediaEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[MediaEntry] {
        &self.entries
    }

    /// File names in playlist order
    pub fn entry_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.file_name().to_string())
            .collect()
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    pub fn set_loop_enabled(&mut self, enabled: bool) {
        self.loop_enabled = enabled;
    }

    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle_enabled
    }

    pub(crate) fn set_shuffle_enabled(&mut self, enabled: bool) {
        self.shuffle_enabled = enabled;
    }
}
