//! FinGuard - Early-warning risk dashboard API
//!
//! Serves the dashboard endpoints over a resilient document store. Firestore
//! (or Postgres) when configured and reachable, memory otherwise.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;

use finguard::api::{self, AppState};
use finguard::{APP_NAME, APP_VERSION, HTTP_BIND_ADDRESS_DEFAULT};
use finguard_store::{BackendHealth, ResilientStore, StoreConfig};

// =============================================================================
// CLI
// =============================================================================

/// FinGuard - Early-warning risk dashboard API
#[derive(Parser, Debug)]
#[command(name = APP_NAME)]
#[command(about = "Risk dashboard API with a resilient document store")]
#[command(version)]
struct Cli {
    /// HTTP API bind address
    #[arg(short, long, default_value = HTTP_BIND_ADDRESS_DEFAULT)]
    bind: String,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Skip the real backend and serve from memory
    #[arg(long)]
    memory_only: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "info,tower_http=debug",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .init();

    tracing::info!("FinGuard v{}", APP_VERSION);

    let config = if cli.memory_only {
        StoreConfig::memory_only()
    } else {
        StoreConfig::from_env()
    };
    tracing::info!(backend = ?config.backend, "store configured");

    let store = Arc::new(ResilientStore::from_config(config, BackendHealth::new()));
    let mode = store.initialize().await;
    tracing::info!(mode = %mode, "store initialized");

    let addr: SocketAddr = cli.bind.parse()?;
    let app = api::router(AppState::new(store));

    tracing::info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
