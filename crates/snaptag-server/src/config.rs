//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use snaptag_shared::constants::{DEFAULT_HTTP_PORT, MAX_UPLOAD_SIZE};

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database holding the `pictures` and `objects` tables.
    /// Env: `DATABASE_PATH`
    /// Default: `./snaptag.db`
    pub database_path: PathBuf,

    /// Filesystem root of uploaded images.
    /// Env: `STORAGE_PATH`
    /// Default: `./storage`
    pub storage_path: PathBuf,

    /// Secret the URL signing key is derived from (hex-encoded, 64 chars).
    /// Env: `SIGNING_SECRET`
    /// Default: all-zeros (development only).
    pub signing_secret: [u8; 32],

    /// Maximum image upload size in bytes.
    /// Env: `MAX_UPLOAD_SIZE`
    /// Default: 10 MiB
    pub max_upload_size: usize,

    /// Externally reachable base URL, used to build signed URLs that a
    /// third-party vision API can fetch.
    /// Env: `PUBLIC_BASE_URL`
    /// Default: `http://localhost:8080`
    pub public_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./snaptag.db"),
            storage_path: PathBuf::from("./storage"),
            signing_secret: [0u8; 32],
            max_upload_size: MAX_UPLOAD_SIZE,
            public_base_url: format!("http://localhost:{DEFAULT_HTTP_PORT}"),
        }
    }
}

// Keeps the signing secret out of logs.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("storage_path", &self.storage_path)
            .field("signing_secret", &"<redacted>")
            .field("max_upload_size", &self.max_upload_size)
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("STORAGE_PATH") {
            config.storage_path = PathBuf::from(path);
        }

        if let Ok(hex_secret) = std::env::var("SIGNING_SECRET") {
            match parse_hex_secret(&hex_secret) {
                Ok(secret) => config.signing_secret = secret,
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid SIGNING_SECRET, using default (dev-only)");
                }
            }
        }

        if let Ok(val) = std::env::var("MAX_UPLOAD_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_upload_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_UPLOAD_SIZE, using default"),
            }
        }

        if let Ok(url) = std::env::var("PUBLIC_BASE_URL") {
            config.public_base_url = url.trim_end_matches('/').to_string();
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.signing_secret == [0u8; 32]
    }
}

/// Parse a 64-character hex string into a 32-byte secret.
fn parse_hex_secret(raw: &str) -> Result<[u8; 32], String> {
    let raw = raw.trim();
    if raw.len() != 64 {
        return Err(format!("expected 64 hex chars, got {}", raw.len()));
    }
    let bytes = hex::decode(raw).map_err(|e| format!("invalid hex: {e}"))?;
    let mut secret = [0u8; 32];
    secret.copy_from_slice(&bytes);
    Ok(secret)
}
