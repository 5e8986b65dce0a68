//! Domain rows persisted by this crate.
//!
//! The structs live in `snaptag-shared` so the HTTP API and the device cache
//! use the exact same shapes; they are re-exported here for convenience.

pub use snaptag_shared::models::{CachedObject, ObjectView, Picture, PictureWithObjects, TaggedObject};
