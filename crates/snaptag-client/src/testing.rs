//! In-memory [`RemoteBackend`] used by the sync and capture tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{Local, Utc};
use uuid::Uuid;

use snaptag_shared::protocol::{
    CreateObject, CreatePicture, SignedUrl, SoftDeleteStats, UpdatePicture, UploadResponse,
};
use snaptag_shared::quota::day_window;
use snaptag_shared::OwnerId;
use snaptag_store::{ObjectView, Picture, PictureWithObjects, TaggedObject};

use crate::error::{ClientError, Result};
use crate::remote::RemoteBackend;

#[derive(Default)]
struct Tables {
    pictures: Vec<Picture>,
    objects: Vec<TaggedObject>,
    uploads: usize,
}

#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<Tables>,
    offline: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the network were down.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn object_rows(&self) -> Vec<TaggedObject> {
        self.tables.lock().unwrap().objects.clone()
    }

    pub fn picture_rows(&self) -> Vec<Picture> {
        self.tables.lock().unwrap().pictures.clone()
    }

    pub fn uploads(&self) -> usize {
        self.tables.lock().unwrap().uploads
    }

    /// Insert a live picture with the given objects directly, as another
    /// device would have.
    pub fn seed(&self, owner: OwnerId, image_ref: &str, names: &[&str]) -> Picture {
        let now = Utc::now();
        let picture = Picture {
            id: Uuid::new_v4(),
            owner_id: owner,
            image_ref: image_ref.to_string(),
            display_name: None,
            description: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        let mut t = self.tables.lock().unwrap();
        for name in names {
            t.objects.push(TaggedObject {
                id: Uuid::new_v4(),
                picture_id: picture.id,
                name: name.to_string(),
                x: None,
                y: None,
                has_ai_coordinates: false,
                is_deleted: false,
                created_at: now,
                updated_at: now,
            });
        }
        t.pictures.push(picture.clone());
        picture
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ClientError::Remote {
                status: 503,
                message: "backend unreachable".into(),
            });
        }
        Ok(())
    }

    fn with_objects(t: &Tables, picture: &Picture) -> PictureWithObjects {
        PictureWithObjects {
            picture: picture.clone(),
            objects: t
                .objects
                .iter()
                .filter(|o| o.picture_id == picture.id && !o.is_deleted)
                .cloned()
                .collect(),
        }
    }
}

fn not_found() -> ClientError {
    ClientError::Remote {
        status: 404,
        message: "Not found".into(),
    }
}

impl RemoteBackend for MemoryBackend {
    async fn find_picture(&self, owner: OwnerId, image_ref: &str) -> Result<Option<Picture>> {
        self.check_online()?;
        let t = self.tables.lock().unwrap();
        Ok(t.pictures
            .iter()
            .find(|p| p.owner_id == owner && p.image_ref == image_ref && !p.is_deleted)
            .cloned())
    }

    async fn create_picture(&self, owner: OwnerId, req: &CreatePicture) -> Result<Picture> {
        self.check_online()?;
        let now = Utc::now();
        let picture = Picture {
            id: Uuid::new_v4(),
            owner_id: owner,
            image_ref: req.image_ref.clone(),
            display_name: req.display_name.clone(),
            description: req.description.clone(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().unwrap().pictures.push(picture.clone());
        Ok(picture)
    }

    async fn insert_object(&self, owner: OwnerId, req: &CreateObject) -> Result<TaggedObject> {
        self.check_online()?;
        let mut t = self.tables.lock().unwrap();
        if !t
            .pictures
            .iter()
            .any(|p| p.id == req.picture_id && p.owner_id == owner)
        {
            return Err(not_found());
        }
        let now = Utc::now();
        let object = TaggedObject {
            id: req.id,
            picture_id: req.picture_id,
            name: req.name.clone(),
            x: req.x,
            y: req.y,
            has_ai_coordinates: req.has_ai_coordinates,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        t.objects.push(object.clone());
        Ok(object)
    }

    async fn list_objects(&self, owner: OwnerId) -> Result<Vec<ObjectView>> {
        self.check_online()?;
        let t = self.tables.lock().unwrap();
        let mut views = Vec::new();
        for o in t.objects.iter().filter(|o| !o.is_deleted) {
            if let Some(p) = t
                .pictures
                .iter()
                .find(|p| p.id == o.picture_id && p.owner_id == owner && !p.is_deleted)
            {
                views.push(ObjectView {
                    id: o.id,
                    picture_id: p.id,
                    owner_id: owner,
                    image_ref: p.image_ref.clone(),
                    name: o.name.clone(),
                    x: o.x,
                    y: o.y,
                    has_ai_coordinates: o.has_ai_coordinates,
                    created_at: o.created_at,
                });
            }
        }
        Ok(views)
    }

    async fn list_pictures(&self, owner: OwnerId) -> Result<Vec<PictureWithObjects>> {
        self.check_online()?;
        let t = self.tables.lock().unwrap();
        Ok(t.pictures
            .iter()
            .filter(|p| p.owner_id == owner && !p.is_deleted)
            .map(|p| Self::with_objects(&t, p))
            .collect())
    }

    async fn search_pictures(&self, owner: OwnerId, query: &str) -> Result<Vec<PictureWithObjects>> {
        let needle = query.to_lowercase();
        Ok(self
            .list_pictures(owner)
            .await?
            .into_iter()
            .filter(|p| p.objects.iter().any(|o| o.name.to_lowercase().contains(&needle)))
            .collect())
    }

    async fn update_picture(&self, owner: OwnerId, id: Uuid, update: &UpdatePicture) -> Result<Picture> {
        self.check_online()?;
        let mut t = self.tables.lock().unwrap();
        let picture = t
            .pictures
            .iter_mut()
            .find(|p| p.id == id && p.owner_id == owner && !p.is_deleted)
            .ok_or_else(not_found)?;
        if let Some(name) = &update.display_name {
            picture.display_name = Some(name.clone());
        }
        if let Some(desc) = &update.description {
            picture.description = Some(desc.clone());
        }
        picture.updated_at = Utc::now();
        Ok(picture.clone())
    }

    async fn rename_object(&self, owner: OwnerId, id: Uuid, name: &str) -> Result<TaggedObject> {
        self.check_online()?;
        let mut t = self.tables.lock().unwrap();
        let owned: Vec<Uuid> = t
            .pictures
            .iter()
            .filter(|p| p.owner_id == owner)
            .map(|p| p.id)
            .collect();
        let object = t
            .objects
            .iter_mut()
            .find(|o| o.id == id && !o.is_deleted && owned.contains(&o.picture_id))
            .ok_or_else(not_found)?;
        object.name = name.to_string();
        object.updated_at = Utc::now();
        Ok(object.clone())
    }

    async fn soft_delete_picture(&self, owner: OwnerId, id: Uuid) -> Result<SoftDeleteStats> {
        self.check_online()?;
        let mut t = self.tables.lock().unwrap();
        let picture = t
            .pictures
            .iter_mut()
            .find(|p| p.id == id && p.owner_id == owner && !p.is_deleted)
            .ok_or_else(not_found)?;
        picture.is_deleted = true;

        let mut stats = SoftDeleteStats {
            pictures: 1,
            objects: 0,
        };
        for o in t.objects.iter_mut().filter(|o| o.picture_id == id && !o.is_deleted) {
            o.is_deleted = true;
            stats.objects += 1;
        }
        Ok(stats)
    }

    async fn today_count(&self, owner: OwnerId) -> Result<u32> {
        self.check_online()?;
        let (start, end) = day_window(&Local::now());
        let t = self.tables.lock().unwrap();
        Ok(t.pictures
            .iter()
            .filter(|p| p.owner_id == owner && p.created_at >= start && p.created_at < end)
            .count() as u32)
    }

    async fn upload_image(&self, owner: OwnerId, data: Vec<u8>, _content_type: &str) -> Result<UploadResponse> {
        self.check_online()?;
        self.tables.lock().unwrap().uploads += 1;
        Ok(UploadResponse {
            path: format!("{owner}/{}.jpg", Uuid::new_v4()),
            size: data.len(),
        })
    }

    async fn sign_url(&self, _owner: OwnerId, path: &str, expires_in: i64) -> Result<SignedUrl> {
        self.check_online()?;
        let expires_at = Utc::now() + chrono::Duration::seconds(expires_in);
        Ok(SignedUrl {
            signed_url: format!(
                "http://backend.test/storage/object/{path}?expires={}&sig=00",
                expires_at.timestamp()
            ),
            expires_at,
        })
    }
}
