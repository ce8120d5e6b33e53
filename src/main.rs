//! Hoteluxe server
//!
//! Usage:
//!   cargo run --bin seed         # demo hotel and rooms
//!   cargo run --bin hoteluxe     # start the API (PORT, default 3000)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use hoteluxe::config::Config;
use hoteluxe::rest::{create_router, AppState};
use hoteluxe::storage::Database;
use hoteluxe::telemetry;

#[derive(Parser)]
#[command(name = "hoteluxe", about = "Hotel booking API server")]
struct Args {
    /// Overrides PORT from the environment
    #[arg(long)]
    port: Option<u16>,
    /// Dotenv file to load before reading the environment
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    match &args.env_file {
        Some(path) => {
            dotenvy::from_path(path).with_context(|| format!("loading {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    let mut config = Config::from_env()?;
    if let Some(port) = args.port {
        config.port = port;
    }
    let _log_guard = telemetry::init(&config)?;

    let db = Arc::new(Database::new(config.database.clone()));
    // Connect eagerly so a bad path shows up at startup; requests retry on their own.
    if let Err(e) = db.storage().await {
        warn!(error = %e, "document store not reachable yet");
    }

    let state = Arc::new(AppState::from_config(&config, db.clone())?);
    let app = create_router(state, config.cors_origin.as_deref());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, environment = ?config.environment, "hoteluxe listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "could not listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("shutting down");
    if db.is_connected() {
        db.storage().await?.flush().await?;
    }
    Ok(())
}
