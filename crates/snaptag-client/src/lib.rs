//! # snaptag-client
//!
//! Device side of SnapTag: the local object cache, write-through to the
//! backend, clear-and-replace sync, the daily capture quota and the vision
//! analysis of captured images.

pub mod capture;
pub mod config;
pub mod error;
pub mod lock;
pub mod remote;
pub mod sync;
pub mod vision;

#[cfg(test)]
mod testing;

use tracing_subscriber::{fmt, EnvFilter};

use snaptag_store::Database;

pub use capture::{Analyzer, CaptureService, CapturedImage};
pub use config::{ClientConfig, VisionConfig};
pub use error::{ClientError, Result};
pub use remote::{HttpBackend, RemoteBackend};
pub use sync::{ObjectDraft, SaveOutcome, SyncEngine, SyncReport};
pub use vision::VisionClient;

/// Install the fmt subscriber. `RUST_LOG` overrides the default directive.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("snaptag_client=debug,snaptag_store=info,warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Open the local cache and build a sync engine against the configured
/// backend.
pub fn connect(config: &ClientConfig) -> Result<SyncEngine<HttpBackend>> {
    let owner = config.owner()?;
    let path = config.resolved_cache_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(snaptag_store::StoreError::from)?;
    }
    let db = Database::open_at(&path)?;
    tracing::debug!(path = %path.display(), owner = %owner, "local cache opened");

    Ok(SyncEngine::new(owner, HttpBackend::new(config.backend_url.clone()), db))
}

/// A capture service using the configured vision model.
pub fn capture_service(config: &ClientConfig) -> Result<CaptureService<HttpBackend, VisionClient>> {
    let engine = connect(config)?;
    let vision = VisionClient::new(config.vision.clone())?;
    Ok(CaptureService::new(engine, vision, config.signed_url_ttl_secs))
}
