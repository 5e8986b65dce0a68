//! JSON payloads exchanged between the device and the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Create a picture row for an uploaded image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePicture {
    pub image_ref: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial metadata update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePicture {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Insert an object row. The id is chosen by the device so that the local
/// cache entry and the remote row share it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateObject {
    pub id: Uuid,
    pub picture_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
    #[serde(default)]
    pub has_ai_coordinates: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameObject {
    pub name: String,
}

/// Arguments of the `soft_delete_picture` remote procedure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftDeletePicture {
    pub picture_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SoftDeleteStats {
    pub pictures: usize,
    pub objects: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodayCount {
    pub count: u32,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PictureQuery {
    #[serde(default)]
    pub image_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Storage path of the uploaded image, used as the picture's image_ref.
    pub path: String,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignRequest {
    pub path: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedUrl {
    pub signed_url: String,
    pub expires_at: DateTime<Utc>,
}

/// Query string of a signed download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureParams {
    pub expires: i64,
    pub sig: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
