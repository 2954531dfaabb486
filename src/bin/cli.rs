//! udpquake CLI
//!
//! Long-running relay from the USGS earthquake feed to a Meshtastic mesh.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use udpquake::{
    error::Result,
    models::Config,
    pipeline::FeedPoller,
    services::{MeshBroadcaster, UsgsFeed},
};

/// udpquake - Earthquake alerts for the mesh
#[derive(Parser, Debug)]
#[command(
    name = "udpquake",
    version,
    about = "Relays regional USGS earthquake alerts to a Meshtastic mesh over UDP"
)]

struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "udpquake.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the feed and broadcast alerts until stopped
    Run,

    /// Run a single poll cycle and exit
    Once,

    /// Validate configuration and print the effective settings
    Check,
}

/// Initialize logging based on configured level and verbosity flag.
fn init_logging(level: &str, verbose: bool) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Load the config file, apply environment overrides and validate.
fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load_or_default(path)?;
    config.apply_env()?;
    config.validate()?;
    Ok(config)
}

/// Cancel `token` on Ctrl+C or SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Received Ctrl+C, shutting down"),
        _ = terminate => log::info!("Received SIGTERM, shutting down"),
    }
    token.cancel();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_logging("info", cli.verbose);
            log::error!("Refusing to start: {}", e);
            return Err(e);
        }
    };
    init_logging(&config.logging.level, cli.verbose);

    log::info!("udpquake {} starting...", env!("CARGO_PKG_VERSION"));
    let config = Arc::new(config);

    match cli.command {
        Command::Check => {
            let bounds = config.bounds();
            let node = config.node_location();
            log::info!("✓ Config OK");
            log::info!("Feed: {}", config.feed.endpoint()?);
            log::info!(
                "Region: lat [{}, {}] lon [{}, {}], M{}+",
                bounds.min_latitude,
                bounds.max_latitude,
                bounds.min_longitude,
                bounds.max_longitude,
                config.region.min_magnitude
            );
            log::info!("Node location: {}, {}", node.latitude, node.longitude);
            log::info!(
                "Poll every {}s, backoff up to {}s, remember alerts for {}s",
                config.poller.interval_secs,
                config.poller.max_backoff_secs,
                config.poller.retention_secs
            );
            log::info!("Mesh destination: {}", config.mesh.destination);
        }

        Command::Once => {
            let mut poller = build_poller(&config).await?;
            let report = poller.poll_once().await?;
            log::info!(
                "Fetched {} events, alerted {} ({} significant), {} send failures",
                report.fetched,
                report.alerted,
                report.significant,
                report.send_failures
            );
        }

        Command::Run => {
            let mut poller = build_poller(&config).await?;
            let cancel = CancellationToken::new();
            tokio::spawn(shutdown_signal(cancel.clone()));
            poller.run(cancel).await;
        }
    }

    log::info!("Done!");

    Ok(())
}

async fn build_poller(config: &Arc<Config>) -> Result<FeedPoller> {
    let source = UsgsFeed::new(&config.feed)?;
    let broadcaster = MeshBroadcaster::bind(&config.mesh).await?;
    Ok(FeedPoller::new(
        Arc::clone(config),
        Box::new(source),
        Box::new(broadcaster),
    ))
}
