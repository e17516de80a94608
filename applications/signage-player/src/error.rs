/// Player error types
use signage_playback::PlaylistError;
use signage_scanner::ScannerError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Start attempt failed before the loop could run
    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The playback engine rejected a file or reported an error
    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Scanner error: {0}")]
    Scanner(#[from] ScannerError),

    #[error("Playlist error: {0}")]
    Playlist(#[from] PlaylistError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}
