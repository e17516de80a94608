//! Selection policies
//!
//! Decide which entry plays next and move the playlist cursor:
//! - Sequential: ascending order, wrapping when looping
//! - Shuffle: random order, each entry once per pass, no immediate repeat

use crate::playlist::Playlist;
use crate::types::{MediaEntry, SelectionMode};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;

/// Common interface of the selection policies
pub trait SelectionStrategy {
    /// Pick the next entry and move the cursor to it
    ///
    /// Returns `None` when the playlist is empty or a non-looping pass is over.
    fn next(&mut self, playlist: &mut Playlist) -> Option<MediaEntry>;

    /// Clear internal state and move the cursor back to `0`
    fn reset(&mut self, playlist: &mut Playlist);
}

/// Ascending order with optional wrap-around
#[derive(Debug, Clone, Default)]
pub struct Sequential;

impl SelectionStrategy for Sequential {
    fn next(&mut self, playlist: &mut Playlist) -> Option<MediaEntry> {
        let len = playlist.len();
        if len == 0 {
            return None;
        }

        // End of list without looping: stay put
        if playlist.cursor() >= len - 1 && !playlist.loop_enabled() {
            return None;
        }

        let next_index = (playlist.cursor() + 1) % len;
        playlist.advance_to_index(next_index);
        playlist.current_entry().cloned()
    }

    fn reset(&mut self, playlist: &mut Playlist) {
        playlist.advance_to_index(0);
    }
}

/// Random order without repeats inside a pass
///
/// Tracks the indices played during the current pass and the last pick. The
/// last pick is never chosen twice in a row unless it is the only candidate.
/// After a reset the cursor sits on index 0 without counting as a pick, so the
/// first `next` may land on the entry that was shown before it.
#[derive(Debug, Clone)]
pub struct ShuffleNoRepeat {
    played: HashSet<usize>,
    last_index: Option<usize>,
    rng: StdRng,
}

impl Default for ShuffleNoRepeat {
    fn default() -> Self {
        Self::new()
    }
}

impl ShuffleNoRepeat {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic shuffle for reproducible runs
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            played: HashSet::new(),
            last_index: None,
            rng,
        }
    }

    /// Indices already played in the current pass
    pub fn played_count(&self) -> usize {
        self.played.len()
    }

    /// Index of the previous pick
    pub fn last_index(&self) -> Option<usize> {
        self.last_index
    }

    fn unplayed(&self, len: usize) -> Vec<usize> {
        (0..len).filter(|i| !self.played.contains(i)).collect()
    }
}

impl SelectionStrategy for ShuffleNoRepeat {
    fn next(&mut self, playlist: &mut Playlist) -> Option<MediaEntry> {
        let len = playlist.len();
        if len == 0 {
            return None;
        }

        if len == 1 {
            playlist.advance_to_index(0);
            return playlist.current_entry().cloned();
        }

        let mut pool = self.unplayed(len);
        if pool.is_empty() {
            if !playlist.loop_enabled() {
                return None;
            }
            // New pass
            self.played.clear();
            pool = (0..len).collect();
        }

        if let Some(last) = self.last_index {
            if pool.len() > 1 {
                pool.retain(|&i| i != last);
            }
        }

        let selected = *pool.choose(&mut self.rng)?;
        self.played.insert(selected);
        self.last_index = Some(selected);
        playlist.advance_to_index(selected);

        playlist.current_entry().cloned()
    }

    fn reset(&mut self, playlist: &mut Playlist) {
        self.played.clear();
        self.last_index = None;
        playlist.advance_to_index(0);
    }
}

/// The active selection policy
///
/// Closed set of variants; a new ordering is added as a new variant.
#[derive(Debug, Clone)]
pub enum SelectionPolicy {
    Sequential(Sequential),
    Shuffle(ShuffleNoRepeat),
}

impl SelectionPolicy {
    /// Fresh policy for a mode
    pub fn for_mode(mode: SelectionMode) -> Self {
        match mode {
            SelectionMode::Sequential => Self::Sequential(Sequential),
            SelectionMode::Shuffle => Self::Shuffle(ShuffleNoRepeat::new()),
        }
    }

    pub fn mode(&self) -> SelectionMode {
        match self {
            Self::Sequential(_) => SelectionMode::Sequential,
            Self::Shuffle(_) => SelectionMode::Shuffle,
        }
    }
}

impl SelectionStrategy for SelectionPolicy {
    fn next(&mut self, playlist: &mut Playlist) -> Option<MediaEntry> {
        match self {
            Self::Sequential(policy) => policy.next(playlist),
            Self::Shuffle(policy) => policy.next(playlist),
        }
    }

    fn reset(&mut self, playlist: &mut Playlist) {
        match self {
            Self::Sequential(policy) => policy.reset(playlist),
            Self::Shuffle(policy) => policy.reset(playlist),
        }
    }
}
