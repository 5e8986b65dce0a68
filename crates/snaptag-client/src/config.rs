//! Device configuration loaded from environment variables.

use std::path::PathBuf;

use snaptag_shared::constants::{DEFAULT_HTTP_PORT, DEFAULT_SIGNED_URL_TTL_SECS, MAX_SIGNED_URL_TTL_SECS};
use snaptag_shared::OwnerId;
use snaptag_store::database::default_path;

use crate::error::{ClientError, Result};

const DEFAULT_VISION_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_VISION_MODEL: &str = "gpt-4o-mini";

/// Vision model endpoint settings.
#[derive(Clone)]
pub struct VisionConfig {
    /// Env: `VISION_API_URL`
    pub api_url: String,
    /// Sent as a bearer token when present.
    /// Env: `VISION_API_KEY`
    pub api_key: Option<String>,
    /// Env: `VISION_MODEL`
    pub model: String,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_VISION_API_URL.to_string(),
            api_key: None,
            model: DEFAULT_VISION_MODEL.to_string(),
        }
    }
}

impl std::fmt::Debug for VisionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .finish()
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Env: `SNAPTAG_BACKEND_URL`
    /// Default: `http://localhost:8080`
    pub backend_url: String,

    /// Signed-in owner.
    /// Env: `SNAPTAG_OWNER_ID`
    pub owner_id: Option<OwnerId>,

    /// Local cache database. `None` uses the platform data directory.
    /// Env: `SNAPTAG_CACHE_PATH`
    pub cache_path: Option<PathBuf>,

    pub vision: VisionConfig,

    /// Lifetime of the signed URL handed to the vision API.
    /// Env: `SIGNED_URL_TTL_SECS`
    /// Default: 600, at most 3600.
    pub signed_url_ttl_secs: i64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: format!("http://localhost:{DEFAULT_HTTP_PORT}"),
            owner_id: None,
            cache_path: None,
            vision: VisionConfig::default(),
            signed_url_ttl_secs: DEFAULT_SIGNED_URL_TTL_SECS,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("SNAPTAG_BACKEND_URL") {
            config.backend_url = url.trim_end_matches('/').to_string();
        }

        if let Ok(owner) = std::env::var("SNAPTAG_OWNER_ID") {
            match owner.parse::<OwnerId>() {
                Ok(id) => config.owner_id = Some(id),
                Err(e) => tracing::warn!(value = %owner, error = %e, "Invalid SNAPTAG_OWNER_ID, ignoring"),
            }
        }

        if let Ok(path) = std::env::var("SNAPTAG_CACHE_PATH") {
            config.cache_path = Some(PathBuf::from(path));
        }

        if let Ok(url) = std::env::var("VISION_API_URL") {
            config.vision.api_url = url;
        }

        if let Ok(key) = std::env::var("VISION_API_KEY") {
            if !key.trim().is_empty() {
                config.vision.api_key = Some(key.trim().to_string());
            }
        }

        if let Ok(model) = std::env::var("VISION_MODEL") {
            config.vision.model = model;
        }

        if let Ok(val) = std::env::var("SIGNED_URL_TTL_SECS") {
            match parse_ttl(&val) {
                Some(ttl) => config.signed_url_ttl_secs = ttl,
                None => tracing::warn!(value = %val, "Invalid SIGNED_URL_TTL_SECS, using default"),
            }
        }

        config
    }

    /// The configured owner, required for every backend call.
    pub fn owner(&self) -> Result<OwnerId> {
        self.owner_id
            .ok_or_else(|| ClientError::Config("SNAPTAG_OWNER_ID is not set".into()))
    }

    /// Path of the local cache database.
    pub fn resolved_cache_path(&self) -> Result<PathBuf> {
        match &self.cache_path {
            Some(path) => Ok(path.clone()),
            None => Ok(default_path()?),
        }
    }
}

fn parse_ttl(val: &str) -> Option<i64> {
    match val.trim().parse::<i64>() {
        Ok(n) if n > 0 && n <= MAX_SIGNED_URL_TTL_SECS => Some(n),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.backend_url, "http://localhost:8080");
        assert_eq!(config.signed_url_ttl_secs, 600);
        assert!(config.owner_id.is_none());
        assert!(config.vision.api_key.is_none());
    }

    #[test]
    fn owner_required() {
        let mut config = ClientConfig::default();
        assert!(matches!(config.owner(), Err(ClientError::Config(_))));

        let owner = OwnerId::new();
        config.owner_id = Some(owner);
        assert_eq!(config.owner().unwrap(), owner);
    }

    #[test]
    fn ttl_bounds() {
        assert_eq!(parse_ttl("120"), Some(120));
        assert_eq!(parse_ttl("3600"), Some(3600));
        assert_eq!(parse_ttl("3601"), None);
        assert_eq!(parse_ttl("0"), None);
        assert_eq!(parse_ttl("-5"), None);
        assert_eq!(parse_ttl("ten"), None);
    }

    #[test]
    fn explicit_cache_path_wins() {
        let config = ClientConfig {
            cache_path: Some(PathBuf::from("/tmp/cache.db")),
            ..Default::default()
        };
        assert_eq!(config.resolved_cache_path().unwrap(), PathBuf::from("/tmp/cache.db"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let vision = VisionConfig {
            api_key: Some("sk-secret".into()),
            ..Default::default()
        };
        let out = format!("{vision:?}");
        assert!(!out.contains("sk-secret"));
        assert!(out.contains("<redacted>"));
    }
}
