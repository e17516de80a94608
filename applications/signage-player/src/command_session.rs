//! Playback session backed by an external player process
//!
//! Each play cycle spawns the configured command (VLC by default) with
//! `--play-and-exit` and the media path, and a monitor task waits for the
//! process to exit.

use crate::{
    config::PlayerSettings,
    error::{EngineError, Result},
    session::{PlaybackSession, SessionCallback},
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State visible to both the session and its monitor task
#[derive(Default)]
struct SessionShared {
    playing: AtomicBool,
    current: Mutex<Option<PathBuf>>,
    on_end: Mutex<Option<SessionCallback>>,
    on_error: Mutex<Option<SessionCallback>>,
}

impl SessionShared {
    fn fire(slot: &Mutex<Option<SessionCallback>>) {
        if let Some(callback) = lock(slot).as_ref() {
            callback();
        }
    }

    fn finish(&self) {
        self.playing.store(false, Ordering::SeqCst);
        *lock(&self.current) = None;
    }
}

struct Cycle {
    cancel: CancellationToken,
    monitor: JoinHandle<()>,
}

/// Plays media by running an external command per file
pub struct CommandSession {
    program: String,
    args: Vec<String>,
    settle: Duration,
    shared: Arc<SessionShared>,
    cycle: Mutex<Option<Cycle>>,
}

impl std::fmt::Debug for CommandSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSession")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("settle", &self.settle)
            .field("playing", &self.shared.playing.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl CommandSession {
    /// `args` go before `--play-and-exit` and the media path
    pub fn new(program: impl Into<String>, args: Vec<String>, settle: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            settle,
            shared: Arc::new(SessionShared::default()),
            cycle: Mutex::new(None),
        }
    }

    pub fn from_settings(settings: &PlayerSettings) -> Self {
        Self::new(
            settings.command.clone(),
            settings.to_args(),
            settings.settle_delay(),
        )
    }

    fn spawn(&self, path: &Path) -> Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .arg("--play-and-exit")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                EngineError::Playback(format!("Failed to start {}: {}", self.program, e))
            })
    }
}

#[async_trait]
impl PlaybackSession for CommandSession {
    async fn play(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            warn!(path = %path.display(), "Video file not found");
            return Err(EngineError::Playback(format!(
                "File not found: {}",
                path.display()
            )));
        }

        let busy = lock(&self.cycle).is_some();
        if busy {
            self.stop().await?;
        }

        let mut child = self.spawn(path)?;

        // Give the player time to open the media before judging it
        tokio::time::sleep(self.settle).await;

        match child.try_wait() {
            Ok(None) => {}
            Ok(Some(status)) if status.success() => {
                debug!(path = %path.display(), "Player finished during start-up");
                SessionShared::fire(&self.shared.on_end);
                return Ok(());
            }
            Ok(Some(status)) => {
                error!(path = %path.display(), %status, "Player rejected video");
                return Err(EngineError::Playback(format!(
                    "Player rejected {}: {}",
                    path.display(),
                    status
                )));
            }
            Err(e) => {
                return Err(EngineError::Playback(format!(
                    "Cannot query player process: {}",
                    e
                )));
            }
        }

        self.shared.playing.store(true, Ordering::SeqCst);
        *lock(&self.shared.current) = Some(path.to_path_buf());

        let cancel = CancellationToken::new();
        let monitor = tokio::spawn(monitor_child(
            child,
            Arc::clone(&self.shared),
            cancel.clone(),
        ));
        *lock(&self.cycle) = Some(Cycle { cancel, monitor });

        info!(path = %path.display(), "Playback started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let cycle = lock(&self.cycle).take();

        if let Some(Cycle { cancel, monitor }) = cycle {
            cancel.cancel();
            let abort = monitor.abort_handle();
            if tokio::time::timeout(STOP_TIMEOUT, monitor).await.is_err() {
                warn!("Player did not stop in time, abandoning it");
                abort.abort();
            }
            debug!("Playback stopped");
        }

        self.shared.finish();
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::SeqCst)
    }

    fn current_path(&self) -> Option<PathBuf> {
        lock(&self.shared.current).clone()
    }

    fn set_on_end(&self, callback: SessionCallback) {
        *lock(&self.shared.on_end) = Some(callback);
    }

    fn set_on_error(&self, callback: SessionCallback) {
        *lock(&self.shared.on_error) = Some(callback);
    }

    async fn cleanup(&self) -> Result<()> {
        self.stop().await?;
        *lock(&self.shared.on_end) = None;
        *lock(&self.shared.on_error) = None;
        info!("Player session released");
        Ok(())
    }
}

/// Wait for the player to exit, or kill it when the cycle is cancelled
///
/// Callbacks fire before `playing` is cleared so a poller that sees the
/// session idle also sees the outcome.
async fn monitor_child(mut child: Child, shared: Arc<SessionShared>, cancel: CancellationToken) {
    tokio::select! {
        status = child.wait() => {
            match status {
                Ok(status) if status.success() => {
                    debug!("Player exited normally");
                    SessionShared::fire(&shared.on_end);
                }
                Ok(status) => {
                    warn!(%status, "Player exited with failure");
                    SessionShared::fire(&shared.on_error);
                }
                Err(e) => {
                    error!(error = %e, "Lost track of player process");
                    SessionShared::fire(&shared.on_error);
                }
            }
            shared.finish();
        }
        () = cancel.cancelled() => {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill player process");
            }
            shared.finish();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    fn shell_session(script: &str) -> CommandSession {
        CommandSession::new(
            "sh",
            vec!["-c".to_string(), script.to_string(), "sh".to_string()],
            Duration::from_millis(50),
        )
    }

    fn video(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("clip.mp4");
        fs::write(&path, b"fake video").unwrap();
        path
    }

    fn counter(session: &CommandSession) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let ended = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));

        let e = Arc::clone(&ended);
        session.set_on_end(Box::new(move || {
            e.fetch_add(1, Ordering::SeqCst);
        }));
        let f = Arc::clone(&failed);
        session.set_on_error(Box::new(move || {
            f.fetch_add(1, Ordering::SeqCst);
        }));

        (ended, failed)
    }

    async fn wait_until_idle(session: &CommandSession) {
        for _ in 0..100 {
            if !session.is_playing() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("session still playing");
    }

    #[test]
    fn test_from_settings_uses_player_args() {
        let session = CommandSession::from_settings(&PlayerSettings::default());
        assert_eq!(session.program, "cvlc");
        assert_eq!(session.args[0], "--intf");
        assert_eq!(session.settle, Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_play_missing_file_fails() {
        let temp = TempDir::new().unwrap();
        let session = shell_session("sleep 1");

        let result = session.play(&temp.path().join("missing.mp4")).await;
        assert!(matches!(result, Err(EngineError::Playback(_))));
        assert!(!session.is_playing());
    }

    #[tokio::test]
    async fn test_rejected_media_fails_play() {
        let temp = TempDir::new().unwrap();
        let session = shell_session("exit 2");
        let (ended, failed) = counter(&session);

        assert!(session.play(&video(&temp)).await.is_err());
        assert_eq!(ended.load(Ordering::SeqCst), 0);
        assert_eq!(failed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_normal_end_fires_end_callback_once() {
        let temp = TempDir::new().unwrap();
        let path = video(&temp);
        let session = shell_session("sleep 0.3");
        let (ended, failed) = counter(&session);

        session.play(&path).await.unwrap();
        assert!(session.is_playing());
        assert_eq!(session.current_path(), Some(path));

        wait_until_idle(&session).await;
        assert_eq!(ended.load(Ordering::SeqCst), 1);
        assert_eq!(failed.load(Ordering::SeqCst), 0);
        assert!(session.current_path().is_none());
    }

    #[tokio::test]
    async fn test_failure_during_playback_fires_error_callback() {
        let temp = TempDir::new().unwrap();
        let session = shell_session("sleep 0.3; exit 3");
        let (ended, failed) = counter(&session);

        session.play(&video(&temp)).await.unwrap();
        wait_until_idle(&session).await;

        assert_eq!(ended.load(Ordering::SeqCst), 0);
        assert_eq!(failed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_kills_without_callbacks() {
        let temp = TempDir::new().unwrap();
        let session = shell_session("sleep 10");
        let (ended, failed) = counter(&session);

        session.play(&video(&temp)).await.unwrap();
        assert!(session.is_playing());

        session.stop().await.unwrap();
        assert!(!session.is_playing());
        session.stop().await.unwrap();

        assert_eq!(ended.load(Ordering::SeqCst), 0);
        assert_eq!(failed.load(Ordering::SeqCst), 0);
    }
}
