//! Savepoint Agent - Main entry point

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use savepoint_agent::{
    api, config::Config, daemon::ticker, daemon::ShutdownCoordinator, host::CommandHost, utils,
    ws::NoticeBroadcaster,
};
use savepoint_core::archiver::ZipArchiver;
use savepoint_core::config::ConfigStore;
use savepoint_core::runner::{JobContext, JobRunner};
use savepoint_core::scheduler::Scheduler;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = if let Some(config_path) = &args.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level, config.log.format)?;

    api::health::init_start_time();

    tracing::info!("Starting savepoint-agent v{}", env!("CARGO_PKG_VERSION"));

    // Only the [backup] section is reloadable
    let store = match args.config.clone() {
        Some(path) => {
            tracing::info!("Backup settings are reloadable from {}", path.display());
            ConfigStore::load(move || Config::reload_backup(&path))?
        }
        None => ConfigStore::fixed(config.backup.clone()),
    };

    let backup_dir = config.paths.backup_dir();
    tracing::info!(
        source = %config.paths.source_dir.display(),
        backup_dir = %backup_dir.display(),
        automatic_backups = config.backup.automatic_backups,
        minutes_between_backups = config.backup.minutes_between_backups,
        backups_to_keep = config.backup.backups_to_keep,
        "Backup configuration"
    );

    let notices = NoticeBroadcaster::new();
    let runner = JobRunner::new(
        JobContext {
            source_dir: config.paths.source_dir.clone(),
            backup_dir,
        },
        Arc::new(CommandHost::new(config.host.clone())),
        Arc::new(ZipArchiver::default()),
        Arc::new(notices.clone()),
    );
    let scheduler = Scheduler::new(Arc::new(store), runner, Utc::now());

    let app = api::create_router(api::AppState {
        scheduler: scheduler.handle(),
        notices,
    });

    // Create shutdown coordinator
    let shutdown_coordinator = ShutdownCoordinator::new();

    let ticker_handle = tokio::spawn(ticker::run(
        scheduler,
        Duration::from_millis(config.agent.tick_millis),
        shutdown_coordinator.token(),
    ));

    // Determine port
    let port = args.port.unwrap_or(config.agent.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Health endpoint: http://{}/health", addr);
    tracing::info!("Notice stream: ws://{}/ws", addr);

    let signal_coordinator = shutdown_coordinator.clone();
    tokio::spawn(async move { signal_coordinator.wait_for_signal().await });

    let server_shutdown = shutdown_coordinator.clone();
    let server_result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await;

    // The server can also stop on its own error; stop the tick loop either way
    shutdown_coordinator.trigger();

    match ticker_handle.await {
        Ok(()) => tracing::info!("Scheduler stopped"),
        Err(e) => tracing::error!("Scheduler task panicked: {}", e),
    }

    server_result.context("HTTP server error")?;
    tracing::info!("Shutdown complete");
    Ok(())
}
