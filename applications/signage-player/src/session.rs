//! Playback session contract
//!
//! A session plays one media file at a time. The orchestrator only depends on
//! this trait, so the concrete engine (an external command, a library binding,
//! a test double) can be swapped freely.

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Callback fired by a session when a play cycle finishes
pub type SessionCallback = Box<dyn Fn() + Send + Sync>;

/// Video playback engine
///
/// Each play cycle fires at most one of the two callbacks. `is_playing`
/// turning false without the error callback is a normal end.
#[async_trait]
pub trait PlaybackSession: Send + Sync {
    /// Start playing `path`
    ///
    /// Fails when the file does not exist or the engine rejects it. A cycle
    /// already in progress is stopped first.
    async fn play(&self, path: &Path) -> Result<()>;

    /// Stop the current cycle without firing callbacks
    async fn stop(&self) -> Result<()>;

    fn is_playing(&self) -> bool;

    /// Path of the cycle in progress
    fn current_path(&self) -> Option<PathBuf>;

    fn set_on_end(&self, callback: SessionCallback);

    fn set_on_error(&self, callback: SessionCallback);

    /// Release engine resources
    async fn cleanup(&self) -> Result<()> {
        self.stop().await
    }
}
