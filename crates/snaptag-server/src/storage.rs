use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use snaptag_shared::signing::validate_storage_path;
use snaptag_shared::OwnerId;

use crate::error::ServerError;

/// Image formats accepted for upload, by MIME type.
const ACCEPTED_IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("image/heic", "heic"),
];

/// File extension for an accepted image MIME type.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    ACCEPTED_IMAGE_TYPES
        .iter()
        .find(|(ty, _)| ty.eq_ignore_ascii_case(mime))
        .map(|(_, ext)| *ext)
}

/// MIME type to serve a stored image with.
pub fn content_type_for(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or("");
    ACCEPTED_IMAGE_TYPES
        .iter()
        .find(|(_, e)| e.eq_ignore_ascii_case(ext))
        .map(|(ty, _)| *ty)
        .unwrap_or("application/octet-stream")
}

/// Join a validated relative storage path onto `base`, refusing anything
/// that would leave it.
fn resolve_within(base: &Path, relative: &str) -> Result<PathBuf, ServerError> {
    validate_storage_path(relative)?;

    let mut resolved = base.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(c) => resolved.push(c),
            _ => {
                return Err(ServerError::BadRequest("Path traversal detected".to_string()));
            }
        }
    }
    Ok(resolved)
}

/// Filesystem-backed object storage for uploaded images, laid out as
/// `<base>/<owner>/<uuid>.<ext>`.
#[derive(Debug, Clone)]
pub struct ImageStore {
    base_path: PathBuf,
    max_size: usize,
}

impl ImageStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::Storage(format!(
                "Failed to create storage directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Image store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Store an image for `owner` and return its storage path.
    pub async fn store_image(
        &self,
        owner: OwnerId,
        data: &[u8],
        extension: &str,
    ) -> Result<String, ServerError> {
        if data.is_empty() {
            return Err(ServerError::BadRequest("Empty upload".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::PayloadTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let relative = format!("{}/{}.{}", owner, Uuid::new_v4(), extension);
        let path = resolve_within(&self.base_path, &relative)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                ServerError::Storage(format!("Failed to create owner directory: {}", e))
            })?;
        }

        fs::write(&path, data)
            .await
            .map_err(|e| ServerError::Storage(format!("Failed to write {}: {}", relative, e)))?;

        debug!(path = %relative, size = data.len(), "Stored image");
        Ok(relative)
    }

    pub async fn read_image(&self, relative: &str) -> Result<Vec<u8>, ServerError> {
        let path = resolve_within(&self.base_path, relative)?;

        if !path.exists() {
            return Err(ServerError::NotFound(format!("image {relative}")));
        }

        let data = fs::read(&path)
            .await
            .map_err(|e| ServerError::Storage(format!("Failed to read {}: {}", relative, e)))?;

        debug!(path = %relative, size = data.len(), "Read image");
        Ok(data)
    }
}
