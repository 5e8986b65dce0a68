use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Invalid owner id: {0}")]
    InvalidOwner(#[from] uuid::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SigningError {
    #[error("Signed URL has expired")]
    Expired,

    #[error("Signature does not match")]
    BadSignature,

    #[error("Invalid signature encoding")]
    Malformed,

    #[error("Invalid storage path")]
    InvalidPath,
}
