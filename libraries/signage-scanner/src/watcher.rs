//! Change reconciler for the video directory
//!
//! Watches one directory (non-recursive) and turns filesystem events into net
//! changes of the visible video set. Events are debounced for a short settle
//! window, then the directory is rescanned and diffed against a cached set.
//! A notification is sent only when files were actually added or removed.
//!
//! # Platform Support
//!
//! - Windows: `ReadDirectoryChangesW`
//! - macOS: `FSEvents`
//! - Linux: `inotify`

use crate::{
    error::ScannerError,
    loader::DirectoryLoader,
    types::{ChangeKind, ChangeNotification, DirectorySummary, WatchEvent},
    Result,
};
use chrono::{DateTime, Utc};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use signage_playback::ExtensionFilter;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Default settle delay in milliseconds
pub const DEFAULT_SETTLE_MS: u64 = 500;

/// Cached view of the directory
#[derive(Debug, Default)]
struct ReconcileState {
    cached: HashSet<PathBuf>,
    last_scan: Option<DateTime<Utc>>,
}

/// Rescan-and-diff logic shared with the pump task
#[derive(Debug)]
struct ReconcileCore {
    dir: PathBuf,
    loader: DirectoryLoader,
    state: Mutex<ReconcileState>,
}

impl ReconcileCore {
    fn state(&self) -> std::sync::MutexGuard<'_, ReconcileState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rescan and diff against the cache; replaces the cache
    fn reconcile(&self, kind: ChangeKind) -> Option<ChangeNotification> {
        let current: HashSet<PathBuf> = self.loader.scan_paths(&self.dir).into_iter().collect();

        let mut state = self.state();
        let added: BTreeSet<PathBuf> = current.difference(&state.cached).cloned().collect();
        let removed: BTreeSet<PathBuf> = state.cached.difference(&current).cloned().collect();
        let total = current.len();

        state.cached = current;
        state.last_scan = Some(Utc::now());
        drop(state);

        if added.is_empty() && removed.is_empty() {
            debug!(?kind, total, "Rescan found no net change");
            return None;
        }

        info!(
            ?kind,
            added = added.len(),
            removed = removed.len(),
            total,
            "Video directory changed"
        );

        Some(ChangeNotification {
            kind,
            added,
            removed,
            total,
        })
    }
}

/// Handle to the active watch
struct WatchHandle {
    // The debouncer owns the watcher, so we need to keep it alive
    debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    pump: JoinHandle<()>,
}

/// Watches the video directory and reports net changes
pub struct ChangeReconciler {
    core: Arc<ReconcileCore>,
    settle_delay: Duration,
    handle: Option<WatchHandle>,
}

impl std::fmt::Debug for ChangeReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeReconciler")
            .field("dir", &self.core.dir)
            .field("settle_delay", &self.settle_delay)
            .field("is_monitoring", &self.is_monitoring())
            .finish()
    }
}

impl ChangeReconciler {
    /// Create a reconciler for `dir`
    pub fn new(dir: impl Into<PathBuf>, loader: DirectoryLoader) -> Self {
        Self {
            core: Arc::new(ReconcileCore {
                dir: dir.into(),
                loader,
                state: Mutex::new(ReconcileState::default()),
            }),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_MS),
            handle: None,
        }
    }

    /// Set the settle delay applied after filesystem events
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.core.dir
    }

    /// Start watching and send net changes to `sink`
    ///
    /// Calling this while already watching does nothing. Fails when the
    /// directory does not exist or the platform watcher cannot be created.
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self, sink: mpsc::Sender<ChangeNotification>) -> Result<()> {
        if self.handle.is_some() {
            warn!(dir = %self.core.dir.display(), "Monitoring already active");
            return Ok(());
        }

        if !self.core.dir.exists() {
            error!(dir = %self.core.dir.display(), "Cannot monitor missing directory");
            return Err(ScannerError::DirectoryNotFound(self.core.dir.clone()));
        }

        // Baseline so the first event diffs against what is on disk now
        if self.core.state().last_scan.is_none() {
            self.core.reconcile(ChangeKind::Poll);
        }

        let (raw_tx, raw_rx) = mpsc::channel::<Vec<Event>>(1000);

        let mut debouncer = new_debouncer(
            self.settle_delay,
            None, // No tick rate
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    let events = events.into_iter().map(|e| e.event).collect();
                    // Receiver is gone once monitoring stops
                    let _ = raw_tx.blocking_send(events);
                }
                Err(errors) => {
                    for error in errors {
                        error!("Watcher error: {:?}", error);
                    }
                }
            },
        )
        .map_err(|e| ScannerError::Watch(format!("Failed to create debouncer: {}", e)))?;

        debouncer
            .watch(&self.core.dir, RecursiveMode::NonRecursive)
            .map_err(|e| ScannerError::Watch(format!("Failed to watch path: {}", e)))?;

        let pump = tokio::spawn(run_pump(Arc::clone(&self.core), raw_rx, sink));

        self.handle = Some(WatchHandle { debouncer, pump });

        info!(dir = %self.core.dir.display(), "Started monitoring");
        Ok(())
    }

    /// Stop watching; does nothing when not watching
    pub fn stop(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            handle.debouncer.stop();
            handle.pump.abort();
            info!(dir = %self.core.dir.display(), "Stopped monitoring");
        }
        Ok(())
    }

    /// Stop watching and forget the cached set
    pub fn cleanup(&mut self) {
        if let Err(e) = self.stop() {
            error!("Failed to stop monitoring: {}", e);
        }

        let mut state = self.core.state();
        state.cached.clear();
        state.last_scan = None;
        drop(state);

        info!("Reconciler resources released");
    }

    /// Reconcile normalized events without the platform watcher
    ///
    /// Returns `None` when there are no events or the rescan shows no net
    /// change.
    pub fn handle_events(&self, events: &[WatchEvent]) -> Option<ChangeNotification> {
        let first = events.first()?;
        for event in events {
            debug!(?event, "Relevant filesystem event");
        }
        self.core.reconcile(first.kind())
    }

    /// Rescan and diff without any event (periodic fallback)
    pub fn poll_once(&self) -> Option<ChangeNotification> {
        self.core.reconcile(ChangeKind::Poll)
    }

    pub fn is_monitoring(&self) -> bool {
        self.handle.is_some()
    }

    pub fn last_scan_time(&self) -> Option<DateTime<Utc>> {
        self.core.state().last_scan
    }

    pub fn cached_count(&self) -> usize {
        self.core.state().cached.len()
    }

    /// Directory status including monitoring state
    pub fn directory_summary(&self) -> DirectorySummary {
        let mut summary = self.core.loader.directory_summary(&self.core.dir);
        summary.is_monitoring = self.is_monitoring();

        let state = self.core.state();
        summary.last_scan_time = state.last_scan;
        summary.cached_video_count = state.cached.len();
        summary
    }
}

/// Pump debounced batches into reconciliations
///
/// Batches already queued behind the first one are folded into the same
/// rescan.
async fn run_pump(
    core: Arc<ReconcileCore>,
    mut raw_rx: mpsc::Receiver<Vec<Event>>,
    sink: mpsc::Sender<ChangeNotification>,
) {
    let filter = core.loader.filter().clone();

    while let Some(batch) = raw_rx.recv().await {
        let mut relevant: Vec<WatchEvent> = batch
            .iter()
            .filter_map(|event| convert_event(event, &filter))
            .collect();

        while let Ok(more) = raw_rx.try_recv() {
            relevant.extend(more.iter().filter_map(|event| convert_event(event, &filter)));
        }

        let Some(first) = relevant.first() else {
            continue;
        };

        for event in &relevant {
            info!(?event, "Video file event");
        }

        if let Some(notification) = core.reconcile(first.kind()) {
            if sink.send(notification).await.is_err() {
                debug!("Change receiver closed, stopping pump");
                break;
            }
        }
    }
}

/// Convert a notify event to a WatchEvent
///
/// Only paths passing `filter` are relevant. Renames are split by which side
/// matches: both sides give `Moved`, only the destination gives `Created`,
/// only the source gives `Deleted`.
pub fn convert_event(event: &Event, filter: &ExtensionFilter) -> Option<WatchEvent> {
    let paths = &event.paths;
    let single = |make: fn(PathBuf) -> WatchEvent| {
        paths
            .first()
            .filter(|p| filter.matches(p))
            .map(|p| make(p.clone()))
    };

    match &event.kind {
        EventKind::Create(_) => single(WatchEvent::Created),
        EventKind::Remove(_) => single(WatchEvent::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => single(WatchEvent::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => single(WatchEvent::Created),
        EventKind::Modify(ModifyKind::Name(_)) | EventKind::Other => {
            if paths.len() == 2 {
                convert_rename(&paths[0], &paths[1], filter)
            } else if matches!(event.kind, EventKind::Other) {
                None
            } else {
                // Unpaired rename: decide by whether the path is still there
                paths
                    .first()
                    .filter(|p| filter.matches(p))
                    .map(|p| {
                        if p.exists() {
                            WatchEvent::Created(p.clone())
                        } else {
                            WatchEvent::Deleted(p.clone())
                        }
                    })
            }
        }
        _ => None,
    }
}

fn convert_rename(from: &Path, to: &Path, filter: &ExtensionFilter) -> Option<WatchEvent> {
    match (filter.matches(from), filter.matches(to)) {
        (true, true) => Some(WatchEvent::Moved {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        }),
        (false, true) => Some(WatchEvent::Created(to.to_path_buf())),
        (true, false) => Some(WatchEvent::Deleted(from.to_path_buf())),
        (false, false) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        Event {
            kind,
            paths: paths.iter().map(PathBuf::from).collect(),
            attrs: Default::default(),
        }
    }

    #[test]
    fn test_convert_create_event() {
        let filter = ExtensionFilter::default();
        let result = convert_event(
            &event(EventKind::Create(CreateKind::File), &["/v/new.mp4"]),
            &filter,
        );
        assert_eq!(result, Some(WatchEvent::Created(PathBuf::from("/v/new.mp4"))));
    }

    #[test]
    fn test_convert_remove_event() {
        let filter = ExtensionFilter::default();
        let result = convert_event(
            &event(EventKind::Remove(RemoveKind::File), &["/v/old.mkv"]),
            &filter,
        );
        assert_eq!(result, Some(WatchEvent::Deleted(PathBuf::from("/v/old.mkv"))));
    }

    #[test]
    fn test_non_matching_paths_ignored() {
        let filter = ExtensionFilter::default();
        let result = convert_event(
            &event(EventKind::Create(CreateKind::File), &["/v/notes.txt"]),
            &filter,
        );
        assert_eq!(result, None);
    }

    #[test]
    fn test_data_modification_ignored() {
        let filter = ExtensionFilter::default();
        let result = convert_event(
            &event(
                EventKind::Modify(ModifyKind::Data(DataChange::Any)),
                &["/v/clip.mp4"],
            ),
            &filter,
        );
        assert_eq!(result, None);
    }

    #[test]
    fn test_rename_decomposition() {
        let filter = ExtensionFilter::default();
        let rename = |from: &str, to: &str| {
            convert_event(
                &event(
                    EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                    &[from, to],
                ),
                &filter,
            )
        };

        assert_eq!(
            rename("/v/a.mp4", "/v/b.mp4"),
            Some(WatchEvent::Moved {
                from: PathBuf::from("/v/a.mp4"),
                to: PathBuf::from("/v/b.mp4"),
            })
        );
        assert_eq!(
            rename("/v/a.part", "/v/a.mp4"),
            Some(WatchEvent::Created(PathBuf::from("/v/a.mp4")))
        );
        assert_eq!(
            rename("/v/a.mp4", "/v/a.bak"),
            Some(WatchEvent::Deleted(PathBuf::from("/v/a.mp4")))
        );
        assert_eq!(rename("/v/a.txt", "/v/b.txt"), None);
    }

    #[test]
    fn test_unpaired_rename_halves() {
        let filter = ExtensionFilter::default();
        assert_eq!(
            convert_event(
                &event(
                    EventKind::Modify(ModifyKind::Name(RenameMode::From)),
                    &["/v/a.mp4"]
                ),
                &filter
            ),
            Some(WatchEvent::Deleted(PathBuf::from("/v/a.mp4")))
        );
        assert_eq!(
            convert_event(
                &event(
                    EventKind::Modify(ModifyKind::Name(RenameMode::To)),
                    &["/v/b.mp4"]
                ),
                &filter
            ),
            Some(WatchEvent::Created(PathBuf::from("/v/b.mp4")))
        );
    }

    #[test]
    fn test_event_kinds() {
        assert_eq!(WatchEvent::Created(PathBuf::new()).kind(), ChangeKind::Created);
        assert_eq!(WatchEvent::Deleted(PathBuf::new()).kind(), ChangeKind::Deleted);
        assert_eq!(
            WatchEvent::Moved {
                from: PathBuf::new(),
                to: PathBuf::new()
            }
            .kind(),
            ChangeKind::Moved
        );
    }
}
