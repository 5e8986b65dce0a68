//! # snaptag-server
//!
//! Backend for SnapTag devices.
//!
//! This binary provides:
//! - **Relational tables** for pictures and detected objects, with soft
//!   delete exposed as a remote procedure
//! - **Object storage** for uploaded images, readable through time-limited
//!   signed URLs so a third-party vision API can fetch them
//! - **REST API** (axum) used by the device-side sync layer

mod api;
mod config;
mod error;
mod storage;

use std::sync::{Arc, Mutex};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use snaptag_shared::signing::derive_signing_key;
use snaptag_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::storage::ImageStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,snaptag_server=debug,snaptag_store=info")),
        )
        .init();

    info!("Starting SnapTag server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    if config.uses_dev_secret() {
        warn!("SIGNING_SECRET not set; signed URLs use the development key");
    }

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = Database::open_at(&config.database_path)?;

    let images = ImageStore::new(config.storage_path.clone(), config.max_upload_size).await?;

    let app_state = AppState {
        db: Arc::new(Mutex::new(db)),
        images: Arc::new(images),
        signing_key: derive_signing_key(&config.signing_secret),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
