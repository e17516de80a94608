/// Signage Player - unattended looping video playback
use clap::{Parser, Subcommand};
use signage_player::{
    CommandSession, EngineSettings, EngineStatus, Orchestrator, SignageConfig,
};
use signage_scanner::DirectoryLoader;
use std::{path::PathBuf, sync::Arc};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "signage-player")]
#[command(about = "Loop the videos of a directory on a signage display", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play the video directory until interrupted
    Run {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// List the videos a directory would contribute to the playlist
    Scan {
        /// Directory path to scan
        path: PathBuf,

        /// Configuration file path (for the supported formats)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate and print the effective configuration
    CheckConfig {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "signage_player=debug,signage_scanner=debug,signage_playback=debug"
    } else {
        "signage_player=info,signage_scanner=info,signage_playback=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Run { config } => {
            run(config).await?;
        }
        Commands::Scan { path, config } => {
            scan_directory(path, config)?;
        }
        Commands::CheckConfig { config } => {
            check_config(config)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<SignageConfig> {
    let config = SignageConfig::load(path.as_deref())?;
    config.validate()?;
    Ok(config)
}

async fn run(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    tracing::info!("Starting Signage Player {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Video directory: {}", config.video_dir.display());
    tracing::info!("Player command: {}", config.player.command);

    let session = Arc::new(CommandSession::from_settings(&config.player));
    let settings = EngineSettings::from_config(&config);
    let heartbeat = settings.refresh_interval;

    let mut orchestrator = Orchestrator::new(settings, session);
    if let Err(e) = orchestrator.start() {
        tracing::error!("Failed to start signage player: {}", e);
        orchestrator.stop().await;
        return Err(e.into());
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut ticker = tokio::time::interval(heartbeat);
    ticker.tick().await;

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            _ = ticker.tick() => log_status(&orchestrator.status()),
        }
    }

    orchestrator.stop().await;
    tracing::info!("Signage Player shut down");
    Ok(())
}

fn log_status(status: &EngineStatus) {
    tracing::info!(
        state = ?status.state,
        videos = status.playlist.total_entries,
        current = status.current_entry_name.as_deref().unwrap_or("-"),
        playing = status.is_playing,
        errors = status.cumulative_error_count,
        consecutive_errors = status.consecutive_error_count,
        monitoring = status.directory.is_monitoring,
        "Status"
    );
}

/// Resolves on Ctrl-C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl-C"),
        () = terminate => tracing::info!("Received SIGTERM"),
    }
}

fn scan_directory(path: PathBuf, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let loader = DirectoryLoader::new(config.filter());

    signage_scanner::validate_directory(&path)?;
    let entries = loader.load_from(&path);

    println!("{}", serde_json::to_string_pretty(&entries)?);
    tracing::info!("Found {} videos in {}", entries.len(), path.display());
    Ok(())
}

fn check_config(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
