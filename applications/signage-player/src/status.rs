/// Status snapshot reported by the orchestrator
use crate::orchestrator::EngineState;
use serde::Serialize;
use signage_playback::PlaylistSummary;
use signage_scanner::DirectorySummary;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub state: EngineState,
    pub running: bool,
    pub cumulative_error_count: u64,
    pub consecutive_error_count: u32,
    /// Playlist loads since construction, including the initial one
    pub reload_count: u64,
    /// Name of the playlist's current entry
    pub current_entry_name: Option<String>,
    pub is_playing: bool,
    pub playing_path: Option<PathBuf>,
    /// Watching failed and the directory is polled instead
    pub degraded_monitoring: bool,
    pub playlist: PlaylistSummary,
    pub directory: DirectorySummary,
}
