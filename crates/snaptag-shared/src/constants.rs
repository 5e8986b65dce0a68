/// Application name
pub const APP_NAME: &str = "SnapTag";

/// Maximum number of pictures an owner may capture per calendar day
pub const DAILY_CAPTURE_LIMIT: u32 = 10;

/// Key-value key holding the JSON blob of the local object cache
pub const OBJECT_CACHE_KEY: &str = "snaptag.objects";

/// Key-value key holding the RFC 3339 timestamp of the last successful sync
pub const LAST_SYNC_KEY: &str = "snaptag.last_sync";

/// Header carrying the authenticated owner id on every backend request
pub const OWNER_HEADER: &str = "x-owner-id";

/// Name given to a detection when the vision response could not be parsed
pub const PLACEHOLDER_OBJECT_NAME: &str = "Unknown object";

/// Fixed timeout for a single vision API call, in seconds
pub const VISION_TIMEOUT_SECS: u64 = 30;

/// Default lifetime of a signed storage URL, in seconds
pub const DEFAULT_SIGNED_URL_TTL_SECS: i64 = 600;

/// Upper bound on a signed storage URL lifetime, in seconds
pub const MAX_SIGNED_URL_TTL_SECS: i64 = 3600;

/// Maximum image upload size in bytes (10 MiB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// BLAKE3 key derivation context for storage URL signing keys
pub const KDF_CONTEXT_URL_SIGNING: &str = "snaptag-url-signing-v1";
