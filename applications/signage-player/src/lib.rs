//! Signage Player Library
//!
//! Unattended looping video playback for digital signage: a playlist built
//! from one directory, kept current by a filesystem watcher, played through an
//! external player with automatic recovery from failures.
//!
//! This library exposes the core components for the binary and for testing.

pub mod command_session;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod session;
pub mod status;

// Re-export commonly used types for convenience
pub use command_session::CommandSession;
pub use config::{EngineSettings, LoopTimings, PlayerSettings, SignageConfig};
pub use error::{EngineError, Result};
pub use orchestrator::{EngineState, Orchestrator, RunPhase};
pub use session::{PlaybackSession, SessionCallback};
pub use status::EngineStatus;
