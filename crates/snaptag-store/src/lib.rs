//! # snaptag-store
//!
//! SQLite persistence for SnapTag.
//!
//! The same crate backs both sides of the sync layer: the backend keeps the
//! authoritative `pictures` and `objects` tables, the device keeps its object
//! cache as a JSON blob in the `kv` table. A synchronous [`Database`] handle
//! wraps a `rusqlite::Connection` and provides typed helpers for each.

pub mod cache;
pub mod database;
pub mod migrations;
pub mod models;
pub mod objects;
pub mod pictures;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
