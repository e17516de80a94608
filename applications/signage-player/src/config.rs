/// Player configuration
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use signage_playback::{ExtensionFilter, SelectionMode, DEFAULT_EXTENSIONS};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "signage.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignageConfig {
    #[serde(default = "default_video_dir")]
    pub video_dir: PathBuf,

    /// Create `video_dir` on start if it does not exist
    #[serde(default = "default_true")]
    pub create_video_dir: bool,

    #[serde(default = "default_supported_formats")]
    pub supported_formats: Vec<String>,

    /// Seconds between status reports and degraded-mode rescans
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,

    /// Consecutive playback failures before a forced rescan
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Seconds to wait after a playback failure
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,

    #[serde(default = "default_true")]
    pub loop_enabled: bool,

    #[serde(default)]
    pub shuffle_enabled: bool,

    #[serde(default)]
    pub player: PlayerSettings,
}

/// External player invocation (VLC-style options)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PlayerSettings {
    #[serde(default = "default_command")]
    pub command: String,

    #[serde(default = "default_interface")]
    pub interface: String,

    #[serde(default = "default_true")]
    pub fullscreen: bool,

    #[serde(default)]
    pub show_video_title: bool,

    #[serde(default)]
    pub show_osd: bool,

    #[serde(default)]
    pub enable_subtitles: bool,

    #[serde(default)]
    pub enable_audio: bool,

    #[serde(default = "default_true")]
    pub quiet_mode: bool,

    #[serde(default = "default_video_output")]
    pub video_output: String,

    #[serde(default = "default_codec")]
    pub codec: String,

    /// Appended after the generated options
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Milliseconds to wait after spawning before checking the player
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

// Default values
fn default_video_dir() -> PathBuf {
    PathBuf::from("/home/pi/kdx-pi-signage/videos")
}

fn default_true() -> bool {
    true
}

fn default_supported_formats() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|ext| (*ext).to_string()).collect()
}

fn default_refresh_interval() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5
}

fn default_command() -> String {
    "cvlc".to_string()
}

fn default_interface() -> String {
    "dummy".to_string()
}

fn default_video_output() -> String {
    "mmal_vout".to_string()
}

fn default_codec() -> String {
    "mmal".to_string()
}

fn default_settle_ms() -> u64 {
    500
}

impl Default for SignageConfig {
    fn default() -> Self {
        Self {
            video_dir: default_video_dir(),
            create_video_dir: true,
            supported_formats: default_supported_formats(),
            refresh_interval: default_refresh_interval(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            loop_enabled: true,
            shuffle_enabled: false,
            player: PlayerSettings::default(),
        }
    }
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            command: default_command(),
            interface: default_interface(),
            fullscreen: true,
            show_video_title: false,
            show_osd: false,
            enable_subtitles: false,
            enable_audio: false,
            quiet_mode: true,
            video_output: default_video_output(),
            codec: default_codec(),
            extra_args: Vec::new(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl PlayerSettings {
    /// Command-line options passed to the player before the media path
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["--intf".to_string(), self.interface.clone()];

        if !self.show_video_title {
            args.push("--no-video-title-show".to_string());
        }
        if self.fullscreen {
            args.push("--fullscreen".to_string());
        }
        if !self.show_osd {
            args.push("--no-osd".to_string());
        }
        if !self.enable_subtitles {
            args.push("--no-spu".to_string());
        }
        if !self.enable_audio {
            args.push("--no-audio".to_string());
        }
        if self.quiet_mode {
            args.push("--quiet".to_string());
        }

        args.extend(["--vout".to_string(), self.video_output.clone()]);
        args.extend(["--codec".to_string(), self.codec.clone()]);
        args.extend(self.extra_args.iter().cloned());

        args
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl SignageConfig {
    /// Load configuration from defaults, a TOML file and the environment
    ///
    /// An explicit `path` must exist. Without one, `signage.toml` in the
    /// working directory is used when present. Environment variables use the
    /// `SIGNAGE_` prefix and `__` for nesting (`SIGNAGE_PLAYER__COMMAND`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("SIGNAGE")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("supported_formats")
                .try_parsing(true),
        );

        let config = settings.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Validate configuration bounds
    pub fn validate(&self) -> Result<()> {
        if self.video_dir.as_os_str().is_empty() {
            return Err(EngineError::Config("video_dir must not be empty".to_string()));
        }

        if self.supported_formats.is_empty() {
            return Err(EngineError::Config(
                "supported_formats must list at least one extension".to_string(),
            ));
        }

        for format in &self.supported_formats {
            let format = format.trim();
            if format.len() < 2 || !format.starts_with('.') {
                return Err(EngineError::Config(format!(
                    "Format must start with a dot: {:?}",
                    format
                )));
            }
        }

        check_range("refresh_interval", self.refresh_interval, 5, 300)?;
        check_range("max_retries", u64::from(self.max_retries), 1, 10)?;
        check_range("retry_delay", self.retry_delay, 1, 60)?;

        if self.player.command.trim().is_empty() {
            return Err(EngineError::Config(
                "player.command must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn filter(&self) -> ExtensionFilter {
        ExtensionFilter::new(&self.supported_formats)
    }

    pub fn selection_mode(&self) -> SelectionMode {
        if self.shuffle_enabled {
            SelectionMode::Shuffle
        } else {
            SelectionMode::Sequential
        }
    }
}

fn check_range(name: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(EngineError::Config(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, value
        )))
    }
}

/// Internal waits of the playback loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTimings {
    /// Wait before re-checking an empty playlist
    pub empty_playlist_wait: Duration,
    /// Wait when the playlist has entries but no current one
    pub missing_entry_wait: Duration,
    /// How often a running playback is checked for its end
    pub poll_interval: Duration,
    /// Filesystem events are batched for this long before reconciling
    pub settle_delay: Duration,
    /// Bound on joining background tasks during stop
    pub stop_timeout: Duration,
}

impl Default for LoopTimings {
    fn default() -> Self {
        Self {
            empty_playlist_wait: Duration::from_secs(5),
            missing_entry_wait: Duration::from_secs(2),
            poll_interval: Duration::from_secs(1),
            settle_delay: Duration::from_millis(500),
            stop_timeout: Duration::from_secs(10),
        }
    }
}

/// Everything the orchestrator needs, resolved from [`SignageConfig`]
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub video_dir: PathBuf,
    pub create_video_dir: bool,
    pub filter: ExtensionFilter,
    pub mode: SelectionMode,
    pub loop_enabled: bool,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub refresh_interval: Duration,
    pub timings: LoopTimings,
}

impl EngineSettings {
    pub fn from_config(config: &SignageConfig) -> Self {
        Self {
            video_dir: config.video_dir.clone(),
            create_video_dir: config.create_video_dir,
            filter: config.filter(),
            mode: config.selection_mode(),
            loop_enabled: config.loop_enabled,
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_secs(config.retry_delay),
            refresh_interval: Duration::from_secs(config.refresh_interval),
            timings: LoopTimings::default(),
        }
    }
}
