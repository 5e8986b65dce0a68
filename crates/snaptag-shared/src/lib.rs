//! # snaptag-shared
//!
//! Types and pure logic shared by the SnapTag backend and the on-device sync
//! layer: ids and domain rows, API payloads, the daily quota window, vision
//! output parsing and signed storage URLs.

pub mod constants;
pub mod detection;
pub mod error;
pub mod models;
pub mod protocol;
pub mod quota;
pub mod signing;
pub mod types;

pub use error::{SharedError, SigningError};
pub use types::OwnerId;
