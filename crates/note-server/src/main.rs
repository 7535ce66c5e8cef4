//! HTTP service for the notes app
//!
//! Provides:
//! - Account registration and password login
//! - Session tokens via HTTP-only cookie or bearer header
//! - Per-user note CRUD and bulk sync
//! - Rotating database backups before each bulk sync

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use note_server::{
    AppState, app, clock::SystemClock, config::Config, spawn_session_purge, storage::Database,
};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "note-server")]
#[command(about = "Notes service with session-authenticated sync")]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = 3000, env = "NOTES_PORT")]
    port: u16,

    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0", env = "NOTES_BIND")]
    bind: String,

    /// Path to config directory
    #[arg(long, default_value = "/config", env = "NOTES_CONFIG_PATH")]
    config_path: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "note_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config_path)?;
    let config_dir = Path::new(&cli.config_path);
    let db = Database::open(&config.database_path(config_dir), config.statement_cache_capacity).await?;
    let backup_dir = config.backup_dir(config_dir);

    let state = Arc::new(AppState::new(config, db.clone(), backup_dir, Arc::new(SystemClock))?);
    let purge = spawn_session_purge(state.clone());

    let app = app(state);

    // Parse bind address
    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port).parse()?;

    tracing::info!("Starting note-server on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(purge) = purge {
        purge.abort();
    }
    db.close().await;
    tracing::info!("Note server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
