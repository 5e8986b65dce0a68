//! Domain rows shared by the backend tables, the HTTP API and the on-device
//! cache.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can travel as
//! JSON between the server and the client unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::OwnerId;

// ---------------------------------------------------------------------------
// Picture
// ---------------------------------------------------------------------------

/// A captured or uploaded image and its user-editable metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Picture {
    pub id: Uuid,
    /// Owner of the picture and of every object tagged in it.
    pub owner_id: OwnerId,
    /// Storage path (or URL) of the image.
    pub image_ref: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    /// Soft-delete flag. Deleted pictures are never returned by read paths.
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Object
// ---------------------------------------------------------------------------

/// An item detected by the vision model or added by hand inside a picture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaggedObject {
    pub id: Uuid,
    pub picture_id: Uuid,
    pub name: String,
    /// Horizontal position as a percentage of the image width.
    pub x: Option<f32>,
    /// Vertical position as a percentage of the image height.
    pub y: Option<f32>,
    /// Whether the position came from the vision model.
    pub has_ai_coordinates: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A live object joined with the picture it belongs to.
///
/// This is the shape the sync layer reads from the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectView {
    pub id: Uuid,
    pub picture_id: Uuid,
    pub owner_id: OwnerId,
    pub image_ref: String,
    pub name: String,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub has_ai_coordinates: bool,
    pub created_at: DateTime<Utc>,
}

/// A live picture together with its live objects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PictureWithObjects {
    #[serde(flatten)]
    pub picture: Picture,
    pub objects: Vec<TaggedObject>,
}

// ---------------------------------------------------------------------------
// Local cache entry
// ---------------------------------------------------------------------------

/// Denormalized copy of an object kept in on-device storage.
///
/// The cache is a write buffer and an offline fallback; it is never
/// authoritative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedObject {
    pub id: Uuid,
    pub owner_id: OwnerId,
    pub image_ref: String,
    pub name: String,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub has_ai_coordinates: bool,
    pub created_at: DateTime<Utc>,
}

impl CachedObject {
    /// True when this entry records the same (image, name, owner) triple.
    pub fn same_triple(&self, image_ref: &str, name: &str, owner_id: OwnerId) -> bool {
        self.owner_id == owner_id && self.image_ref == image_ref && self.name == name
    }
}

impl From<ObjectView> for CachedObject {
    fn from(view: ObjectView) -> Self {
        Self {
            id: view.id,
            owner_id: view.owner_id,
            image_ref: view.image_ref,
            name: view.name,
            x: view.x,
            y: view.y,
            has_ai_coordinates: view.has_ai_coordinates,
            created_at: view.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cached(owner: OwnerId, image: &str, name: &str) -> CachedObject {
        CachedObject {
            id: Uuid::new_v4(),
            owner_id: owner,
            image_ref: image.to_string(),
            name: name.to_string(),
            x: None,
            y: None,
            has_ai_coordinates: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn same_triple_requires_all_three() {
        let owner = OwnerId::new();
        let entry = cached(owner, "a/1.jpg", "cup");

        assert!(entry.same_triple("a/1.jpg", "cup", owner));
        assert!(!entry.same_triple("a/2.jpg", "cup", owner));
        assert!(!entry.same_triple("a/1.jpg", "Cup", owner));
        assert!(!entry.same_triple("a/1.jpg", "cup", OwnerId::new()));
    }

    #[test]
    fn picture_with_objects_flattens_picture_fields() {
        let now = Utc::now();
        let pwo = PictureWithObjects {
            picture: Picture {
                id: Uuid::new_v4(),
                owner_id: OwnerId::new(),
                image_ref: "o/p.jpg".into(),
                display_name: Some("Desk".into()),
                description: None,
                is_deleted: false,
                created_at: now,
                updated_at: now,
            },
            objects: vec![],
        };

        let json = serde_json::to_value(&pwo).unwrap();
        assert_eq!(json["image_ref"], "o/p.jpg");
        assert!(json["objects"].as_array().unwrap().is_empty());

        let back: PictureWithObjects = serde_json::from_value(json).unwrap();
        assert_eq!(back, pwo);
    }
}
