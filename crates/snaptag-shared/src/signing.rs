//! Time-limited signed storage URLs.
//!
//! signature = hex(BLAKE3-keyed(key, path || "\n" || expires_unix))

use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;

use crate::constants::KDF_CONTEXT_URL_SIGNING;
use crate::error::SigningError;

pub type SigningKey = [u8; 32];

/// Derive the URL signing key from the configured server secret.
pub fn derive_signing_key(secret: &[u8]) -> SigningKey {
    blake3::derive_key(KDF_CONTEXT_URL_SIGNING, secret)
}

/// Reject absolute paths, traversal components and empty segments.
pub fn validate_storage_path(path: &str) -> Result<(), SigningError> {
    if path.is_empty() || path.starts_with('/') || path.contains('\\') {
        return Err(SigningError::InvalidPath);
    }
    if path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(SigningError::InvalidPath);
    }
    Ok(())
}

pub fn sign_path(key: &SigningKey, path: &str, expires: DateTime<Utc>) -> String {
    hex::encode(mac(key, path, expires.timestamp()))
}

/// Check a signature against `now`. Expiry is checked before the MAC so an
/// expired link is reported as such even when it was genuine.
pub fn verify_path(
    key: &SigningKey,
    path: &str,
    expires_unix: i64,
    signature_hex: &str,
    now: DateTime<Utc>,
) -> Result<(), SigningError> {
    validate_storage_path(path)?;

    if now.timestamp() >= expires_unix {
        return Err(SigningError::Expired);
    }

    let provided = hex::decode(signature_hex).map_err(|_| SigningError::Malformed)?;
    let expected = mac(key, path, expires_unix);

    if provided.len() != expected.len() || provided.ct_eq(&expected).unwrap_u8() != 1 {
        return Err(SigningError::BadSignature);
    }
    Ok(())
}

fn mac(key: &SigningKey, path: &str, expires_unix: i64) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_keyed(key);
    hasher.update(path.as_bytes());
    hasher.update(b"\n");
    hasher.update(expires_unix.to_string().as_bytes());
    *hasher.finalize().as_bytes()
}
