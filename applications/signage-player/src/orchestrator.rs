//! Playback orchestrator
//!
//! Drives the unattended loop: pick the current entry, play it, wait for the
//! end, advance, and recover from failures. Directory changes arrive from the
//! change reconciler and trigger playlist reloads from a separate task.
//!
//! Playlist and policy live behind one mutex, so a reload never interleaves
//! with a selection.

use crate::{
    config::{EngineSettings, LoopTimings},
    error::{EngineError, Result},
    session::PlaybackSession,
    status::EngineStatus,
};
use serde::Serialize;
use signage_playback::PlaylistManager;
use signage_scanner::{validate_directory, ChangeNotification, ChangeReconciler, DirectoryLoader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Sub-state while the loop is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Playing,
    WaitingForVideo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Initializing,
    Running(RunPhase),
    /// Handling a playback failure
    Recovering,
    Stopped,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the orchestrator and its tasks
struct Shared {
    video_dir: PathBuf,
    loader: DirectoryLoader,
    library: Mutex<PlaylistManager>,
    state: Mutex<EngineState>,
    running: AtomicBool,
    error_count: AtomicU64,
    consecutive_errors: AtomicU32,
    reload_count: AtomicU64,
    /// Set by the session's error callback for the cycle in progress
    playback_failed: AtomicBool,
}

impl Shared {
    fn library(&self) -> MutexGuard<'_, PlaylistManager> {
        lock(&self.library)
    }

    fn state(&self) -> EngineState {
        *lock(&self.state)
    }

    fn set_state(&self, next: EngineState) {
        let mut state = lock(&self.state);
        if *state != next {
            debug!(from = ?*state, to = ?next, "State change");
            *state = next;
        }
    }

    /// Rescan the directory and replace the playlist
    fn reload(&self) -> usize {
        let entries = self.loader.load_from(&self.video_dir);
        let count = self.library().load(entries);
        self.reload_count.fetch_add(1, Ordering::SeqCst);

        if count == 0 {
            warn!(dir = %self.video_dir.display(), "No videos found");
        } else {
            info!(count, "Playlist reloaded");
        }
        count
    }

    /// Count one failure; returns true when it forced a reload
    fn record_failure(&self, max_retries: u32) -> bool {
        let total = self.error_count.fetch_add(1, Ordering::SeqCst) + 1;
        let consecutive = self.consecutive_errors.fetch_add(1, Ordering::SeqCst) + 1;
        warn!(consecutive, total, "Playback failure recorded");

        if consecutive >= max_retries {
            warn!(consecutive, "Too many consecutive errors, reloading playlist");
            self.reload();
            self.consecutive_errors.store(0, Ordering::SeqCst);
            return true;
        }
        false
    }
}

/// Unattended playback engine
pub struct Orchestrator {
    settings: EngineSettings,
    session: Arc<dyn PlaybackSession>,
    shared: Arc<Shared>,
    reconciler: Option<ChangeReconciler>,
    changes: Option<mpsc::Receiver<ChangeNotification>>,
    /// Rescans the directory when watching failed; shared with its task
    poller: Option<Arc<ChangeReconciler>>,
    initialized: bool,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("video_dir", &self.settings.video_dir)
            .field("state", &self.shared.state())
            .field("degraded", &self.poller.is_some())
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(settings: EngineSettings, session: Arc<dyn PlaybackSession>) -> Self {
        let shared = Shared {
            video_dir: settings.video_dir.clone(),
            loader: DirectoryLoader::new(settings.filter.clone()),
            library: Mutex::new(PlaylistManager::new(settings.mode, settings.loop_enabled)),
            state: Mutex::new(EngineState::Idle),
            running: AtomicBool::new(false),
            error_count: AtomicU64::new(0),
            consecutive_errors: AtomicU32::new(0),
            reload_count: AtomicU64::new(0),
            playback_failed: AtomicBool::new(false),
        };

        Self {
            settings,
            session,
            shared: Arc::new(shared),
            reconciler: None,
            changes: None,
            poller: None,
            initialized: false,
            shutdown: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn state(&self) -> EngineState {
        self.shared.state()
    }

    /// Validate the directory, load the playlist and begin monitoring
    ///
    /// Does nothing when already initialized. On failure every partially
    /// acquired resource is released and the state returns to `Idle`.
    /// Must be called from within a Tokio runtime.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            debug!("Already initialized");
            return Ok(());
        }

        self.shared.set_state(EngineState::Initializing);
        info!(dir = %self.settings.video_dir.display(), "Initializing signage player");

        match self.setup() {
            Ok(()) => {
                self.initialized = true;
                info!("Initialization complete");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Initialization failed");
                self.release_monitoring();
                self.shared.set_state(EngineState::Idle);
                Err(e)
            }
        }
    }

    fn setup(&mut self) -> Result<()> {
        let dir = self.settings.video_dir.clone();

        if !dir.exists() && self.settings.create_video_dir {
            warn!(dir = %dir.display(), "Video directory missing, creating it");
            std::fs::create_dir_all(&dir).map_err(|e| {
                EngineError::Setup(format!(
                    "Cannot create video directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        validate_directory(&dir)
            .map_err(|e| EngineError::Setup(format!("Invalid video directory: {}", e)))?;

        self.register_callbacks();

        if self.shared.reload() == 0 {
            warn!("Starting without videos, waiting for files to appear");
        }

        self.start_monitoring();
        Ok(())
    }

    fn register_callbacks(&self) {
        let shared = Arc::clone(&self.shared);
        self.session.set_on_error(Box::new(move || {
            shared.playback_failed.store(true, Ordering::SeqCst);
            error!("Player reported a playback error");
        }));
        self.session
            .set_on_end(Box::new(|| debug!("Video finished, moving on")));
    }

    fn start_monitoring(&mut self) {
        let mut reconciler =
            ChangeReconciler::new(self.settings.video_dir.clone(), self.shared.loader.clone())
                .with_settle_delay(self.settings.timings.settle_delay);
        let (tx, rx) = mpsc::channel(CHANGE_CHANNEL_CAPACITY);

        match reconciler.start(tx) {
            Ok(()) => {
                self.changes = Some(rx);
                self.reconciler = Some(reconciler);
            }
            Err(e) => {
                warn!(
                    error = %e,
                    interval = ?self.settings.refresh_interval,
                    "Directory monitoring unavailable, falling back to periodic rescans"
                );
                // Baseline matches the playlist just loaded
                if reconciler.last_scan_time().is_none() {
                    reconciler.poll_once();
                }
                self.poller = Some(Arc::new(reconciler));
            }
        }
    }

    fn release_monitoring(&mut self) {
        if let Some(mut reconciler) = self.reconciler.take() {
            reconciler.cleanup();
        }
        if let Some(poller) = self.poller.take() {
            match Arc::try_unwrap(poller) {
                Ok(mut poller) => poller.cleanup(),
                Err(_) => debug!("Rescan task still holds the poller"),
            }
        }
        self.changes = None;
    }

    /// Initialize if needed and spawn the playback loop
    pub fn start(&mut self) -> Result<()> {
        if self.shared.running.load(Ordering::SeqCst) {
            warn!("Signage player already running");
            return Ok(());
        }

        self.initialize()?;

        self.shutdown = CancellationToken::new();
        self.shared.running.store(true, Ordering::SeqCst);

        if let Some(changes) = self.changes.take() {
            self.tasks.push(tokio::spawn(run_reload_pump(
                Arc::clone(&self.shared),
                changes,
                self.shutdown.clone(),
            )));
        }

        if let Some(poller) = &self.poller {
            self.tasks.push(tokio::spawn(run_degraded_poller(
                Arc::clone(&self.shared),
                Arc::clone(poller),
                self.settings.refresh_interval,
                self.shutdown.clone(),
            )));
        }

        let playback = PlaybackLoop {
            shared: Arc::clone(&self.shared),
            session: Arc::clone(&self.session),
            max_retries: self.settings.max_retries.max(1),
            retry_delay: self.settings.retry_delay,
            timings: self.settings.timings,
            shutdown: self.shutdown.clone(),
        };
        self.tasks.push(tokio::spawn(playback.run()));

        info!("Signage player started");
        Ok(())
    }

    /// Stop playback and release every resource
    ///
    /// Calling this when nothing is running does nothing.
    pub async fn stop(&mut self) {
        if !self.initialized && self.tasks.is_empty() {
            debug!("Stop requested while not running");
            return;
        }

        info!("Stopping signage player");
        self.shared.running.store(false, Ordering::SeqCst);
        self.shutdown.cancel();

        if let Err(e) = self.session.stop().await {
            warn!(error = %e, "Failed to stop playback");
        }

        let stop_timeout = self.settings.timings.stop_timeout;
        for task in self.tasks.drain(..) {
            let abort = task.abort_handle();
            match tokio::time::timeout(stop_timeout, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Background task failed"),
                Err(_) => {
                    warn!(timeout = ?stop_timeout, "Background task did not finish in time");
                    abort.abort();
                }
            }
        }

        // A play call racing the shutdown may have started a new cycle
        if let Err(e) = self.session.cleanup().await {
            warn!(error = %e, "Failed to release player session");
        }

        self.release_monitoring();
        self.initialized = false;
        self.shared.set_state(EngineState::Stopped);
        info!("Signage player stopped");
    }

    /// Rescan the video directory now; returns the new entry count
    pub fn reload(&self) -> usize {
        info!("Playlist reload requested");
        self.shared.reload()
    }

    pub fn status(&self) -> EngineStatus {
        let playlist = self.shared.library().summary();
        let directory = match (&self.reconciler, &self.poller) {
            (Some(reconciler), _) => reconciler.directory_summary(),
            (None, Some(poller)) => poller.directory_summary(),
            (None, None) => self
                .shared
                .loader
                .directory_summary(&self.settings.video_dir),
        };

        EngineStatus {
            state: self.shared.state(),
            running: self.shared.running.load(Ordering::SeqCst),
            cumulative_error_count: self.shared.error_count.load(Ordering::SeqCst),
            consecutive_error_count: self.shared.consecutive_errors.load(Ordering::SeqCst),
            reload_count: self.shared.reload_count.load(Ordering::SeqCst),
            current_entry_name: playlist.current_entry.clone(),
            is_playing: self.session.is_playing(),
            playing_path: self.session.current_path(),
            degraded_monitoring: self.poller.is_some(),
            playlist,
            directory,
        }
    }
}

/// The playback loop task
struct PlaybackLoop {
    shared: Arc<Shared>,
    session: Arc<dyn PlaybackSession>,
    max_retries: u32,
    retry_delay: Duration,
    timings: LoopTimings,
    shutdown: CancellationToken,
}

impl PlaybackLoop {
    async fn run(self) {
        info!("Playback loop started");

        while !self.shutdown.is_cancelled() {
            let (is_empty, current) = {
                let library = self.shared.library();
                (library.is_empty(), library.current_entry().cloned())
            };

            if is_empty {
                self.shared
                    .set_state(EngineState::Running(RunPhase::WaitingForVideo));
                debug!("Playlist empty, waiting for videos");
                self.pause(self.timings.empty_playlist_wait).await;
                continue;
            }

            let Some(entry) = current else {
                warn!("Playlist has no current entry");
                self.pause(self.timings.missing_entry_wait).await;
                continue;
            };

            self.shared.set_state(EngineState::Running(RunPhase::Playing));
            self.shared.playback_failed.store(false, Ordering::SeqCst);
            info!(file = entry.file_name(), "Playing video");

            if let Err(e) = self.session.play(entry.path()).await {
                error!(file = entry.file_name(), error = %e, "Failed to play video");
                self.handle_failure().await;
                continue;
            }

            self.shared.consecutive_errors.store(0, Ordering::SeqCst);
            self.wait_for_end().await;
            if self.shutdown.is_cancelled() {
                break;
            }

            if self.shared.playback_failed.swap(false, Ordering::SeqCst) {
                error!(file = entry.file_name(), "Playback failed mid-video");
                if self.handle_failure().await {
                    continue;
                }
            }

            let (next, loop_enabled) = {
                let mut library = self.shared.library();
                (library.next_entry(), library.loop_enabled())
            };

            if next.is_none() && !loop_enabled {
                info!("Playlist pass complete, rescanning directory");
                self.shared.reload();
            }
        }

        info!("Playback loop finished");
    }

    /// Sleep unless shutdown comes first; returns false on shutdown
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            () = self.shutdown.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }

    async fn wait_for_end(&self) {
        while self.session.is_playing() {
            if !self.pause(self.timings.poll_interval).await {
                return;
            }
        }
    }

    /// Record a failure and wait the retry delay; true if it forced a reload
    async fn handle_failure(&self) -> bool {
        self.shared.set_state(EngineState::Recovering);
        let reloaded = self.shared.record_failure(self.max_retries);
        self.pause(self.retry_delay).await;
        reloaded
    }
}

/// Reload the playlist for every reported directory change
async fn run_reload_pump(
    shared: Arc<Shared>,
    mut changes: mpsc::Receiver<ChangeNotification>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            change = changes.recv() => {
                let Some(change) = change else {
                    debug!("Change channel closed");
                    break;
                };

                info!(
                    kind = ?change.kind,
                    added = change.added.len(),
                    removed = change.removed.len(),
                    total = change.total,
                    "Video directory changed, reloading playlist"
                );
                shared.reload();
            }
        }
    }
}

/// Periodic rescans when the directory cannot be watched
///
/// An unprimed reconciler is primed first so files already in the playlist
/// are not reported as added.
async fn run_degraded_poller(
    shared: Arc<Shared>,
    reconciler: Arc<ChangeReconciler>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    if reconciler.last_scan_time().is_none() {
        reconciler.poll_once();
    }

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(interval) => {
                if let Some(change) = reconciler.poll_once() {
                    info!(
                        added = change.added.len(),
                        removed = change.removed.len(),
                        "Rescan found changes, reloading playlist"
                    );
                    shared.reload();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::time::Instant;
    use tempfile::TempDir;

    fn shared_for(dir: &Path) -> Shared {
        Shared {
            video_dir: dir.to_path_buf(),
            loader: DirectoryLoader::default(),
            library: Mutex::new(PlaylistManager::default()),
            state: Mutex::new(EngineState::Idle),
            running: AtomicBool::new(false),
            error_count: AtomicU64::new(0),
            consecutive_errors: AtomicU32::new(0),
            reload_count: AtomicU64::new(0),
            playback_failed: AtomicBool::new(false),
        }
    }

    fn reloads(shared: &Shared) -> u64 {
        shared.reload_count.load(Ordering::SeqCst)
    }

    #[test]
    fn test_state_serializes_as_snake_case() {
        let json = serde_json::to_string(&EngineState::Running(RunPhase::WaitingForVideo)).unwrap();
        assert_eq!(json, r#"{"running":"waiting_for_video"}"#);
        assert_eq!(serde_json::to_string(&EngineState::Idle).unwrap(), r#""idle""#);
    }

    #[test]
    fn test_record_failure_resets_at_limit() {
        let shared = shared_for(Path::new("/nonexistent/videos"));

        assert!(!shared.record_failure(3));
        assert!(!shared.record_failure(3));
        assert!(shared.record_failure(3));
        assert_eq!(shared.consecutive_errors.load(Ordering::SeqCst), 0);
        assert_eq!(shared.error_count.load(Ordering::SeqCst), 3);
        assert_eq!(reloads(&shared), 1);

        assert!(!shared.record_failure(3));
        assert_eq!(shared.error_count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_rescan_mode_keeps_position_on_unchanged_directory() {
        let temp = TempDir::new().unwrap();
        for name in ["1.mp4", "2.mp4", "3.mp4"] {
            fs::write(temp.path().join(name), b"fake video").unwrap();
        }

        let shared = Arc::new(shared_for(temp.path()));
        assert_eq!(shared.reload(), 3);
        {
            let mut library = shared.library();
            library.next_entry();
            library.next_entry();
        }
        assert_eq!(shared.library().playlist().cursor(), 2);

        // Unprimed, as if the watcher never got to scan
        let poller = Arc::new(ChangeReconciler::new(
            temp.path(),
            DirectoryLoader::default(),
        ));
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_degraded_poller(
            Arc::clone(&shared),
            Arc::clone(&poller),
            Duration::from_millis(20),
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(reloads(&shared), 1);
        assert_eq!(shared.library().playlist().cursor(), 2);
        assert_eq!(poller.cached_count(), 3);

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_rescan_mode_reloads_once_per_change() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.mp4"), b"fake video").unwrap();

        let shared = Arc::new(shared_for(temp.path()));
        shared.reload();

        let poller = Arc::new(ChangeReconciler::new(
            temp.path(),
            DirectoryLoader::default(),
        ));
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_degraded_poller(
            Arc::clone(&shared),
            Arc::clone(&poller),
            Duration::from_millis(20),
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(temp.path().join("b.mp4"), b"fake video").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while reloads(&shared) < 2 {
            assert!(Instant::now() < deadline, "new file was not picked up");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(reloads(&shared), 2);
        assert_eq!(shared.library().len(), 2);
        assert!(poller.last_scan_time().is_some());

        shutdown.cancel();
        task.await.unwrap();
    }
}
