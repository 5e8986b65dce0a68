use thiserror::Error;

use snaptag_store::StoreError;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Local store error: {0}")]
    Store(#[from] StoreError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Daily capture limit reached ({count}/{limit})")]
    QuotaExceeded { count: u32, limit: u32 },

    #[error("Object name must not be empty")]
    InvalidName,

    #[error("Image reference must not be empty")]
    InvalidImageRef,

    #[error("Vision API error: {0}")]
    Vision(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Local database lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, ClientError>;
