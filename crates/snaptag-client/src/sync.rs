//! Local-first object synchronization.
//!
//! The device keeps a denormalized copy of its objects in the local
//! key-value cache and writes through to the backend:
//!
//! - [`SyncEngine::save_object`] appends to the cache under the
//!   [`CacheLock`], skipping an already cached (image, name, owner) triple,
//!   then looks up or creates the picture remotely and inserts the object.
//!   A failed remote write leaves the cache entry in place and is only
//!   logged.
//! - [`SyncEngine::sync`] wipes the cache and refills it from the backend.
//!   Remote always wins; unsynced local entries are dropped.
//! - [`SyncEngine::check_quota`] gates captures on today's picture count.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use snaptag_shared::constants::DAILY_CAPTURE_LIMIT;
use snaptag_shared::detection::Detection;
use snaptag_shared::protocol::{CreateObject, CreatePicture, SoftDeleteStats, UpdatePicture};
use snaptag_shared::quota::QuotaStatus;
use snaptag_shared::types::{clamp_percent, normalize_name};
use snaptag_shared::OwnerId;
use snaptag_store::{CachedObject, Database, Picture, PictureWithObjects, StoreError, TaggedObject};

use crate::error::{ClientError, Result};
use crate::lock::CacheLock;
use crate::remote::RemoteBackend;

/// An object about to be saved, either detected or typed in by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDraft {
    pub name: String,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub has_ai_coordinates: bool,
}

impl ObjectDraft {
    /// A manually added object without a position.
    pub fn manual(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            x: None,
            y: None,
            has_ai_coordinates: false,
        }
    }
}

impl From<&Detection> for ObjectDraft {
    fn from(d: &Detection) -> Self {
        Self {
            name: d.name.clone(),
            x: d.x,
            y: d.y,
            has_ai_coordinates: d.has_ai_coordinates(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheWrite {
    Inserted,
    /// The same (image, name, owner) triple was already cached.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteWrite {
    Inserted { picture_id: Uuid, object_id: Uuid },
    /// Not attempted because the cache write was a duplicate.
    Skipped,
    /// The backend call failed; the cache entry stays, nothing tracks it.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub object_id: Uuid,
    pub cache: CacheWrite,
    pub remote: RemoteWrite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Entries now in the cache.
    pub fetched: usize,
    /// Entries of this owner that were cached but absent remotely.
    pub dropped_local: usize,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingSource {
    Remote,
    Cache,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectListing {
    pub objects: Vec<CachedObject>,
    pub source: ListingSource,
}

/// Sync layer for one signed-in owner.
pub struct SyncEngine<R> {
    owner: OwnerId,
    remote: R,
    local: Mutex<Database>,
    cache_lock: CacheLock,
}

impl<R: RemoteBackend> SyncEngine<R> {
    pub fn new(owner: OwnerId, remote: R, local: Database) -> Self {
        Self::with_lock(owner, remote, local, CacheLock::new())
    }

    pub fn with_lock(owner: OwnerId, remote: R, local: Database, cache_lock: CacheLock) -> Self {
        Self {
            owner,
            remote,
            local: Mutex::new(local),
            cache_lock,
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    fn with_local<T>(&self, f: impl FnOnce(&Database) -> snaptag_store::Result<T>) -> Result<T> {
        let db = self.local.lock().map_err(|_| ClientError::LockPoisoned)?;
        Ok(f(&db)?)
    }

    fn with_local_mut<T>(&self, f: impl FnOnce(&mut Database) -> snaptag_store::Result<T>) -> Result<T> {
        let mut db = self.local.lock().map_err(|_| ClientError::LockPoisoned)?;
        Ok(f(&mut db)?)
    }

    // ------------------------------------------------------------------
    // Save
    // ------------------------------------------------------------------

    /// Record an object for `image_ref` locally, then write it through.
    ///
    /// Only local failures are returned as errors. The remote write result is
    /// reported in [`SaveOutcome::remote`].
    pub async fn save_object(&self, image_ref: &str, draft: &ObjectDraft) -> Result<SaveOutcome> {
        let image_ref = image_ref.trim();
        if image_ref.is_empty() {
            return Err(ClientError::InvalidImageRef);
        }
        let name = normalize_name(&draft.name).ok_or(ClientError::InvalidName)?;
        let x = draft.x.and_then(clamp_percent);
        let y = draft.y.and_then(clamp_percent);
        let has_ai_coordinates = draft.has_ai_coordinates && x.is_some() && y.is_some();

        let (object_id, cache) = {
            let _guard = self.cache_lock.acquire().await;
            self.with_local(|db| {
                let mut entries = db.load_object_cache()?;
                if let Some(existing) = entries
                    .iter()
                    .find(|e| e.same_triple(image_ref, &name, self.owner))
                {
                    return Ok((existing.id, CacheWrite::Duplicate));
                }

                let entry = CachedObject {
                    id: Uuid::new_v4(),
                    owner_id: self.owner,
                    image_ref: image_ref.to_string(),
                    name: name.clone(),
                    x,
                    y,
                    has_ai_coordinates,
                    created_at: Utc::now(),
                };
                let id = entry.id;
                entries.push(entry);
                db.store_object_cache(&entries)?;
                Ok((id, CacheWrite::Inserted))
            })?
        };

        if cache == CacheWrite::Duplicate {
            debug!(owner = %self.owner, image = %image_ref, name = %name, "object already cached, skipping");
            return Ok(SaveOutcome {
                object_id,
                cache,
                remote: RemoteWrite::Skipped,
            });
        }

        let create = CreateObject {
            id: object_id,
            picture_id: Uuid::nil(),
            name: name.clone(),
            x,
            y,
            has_ai_coordinates,
        };

        let remote = match self.upsert_remote(image_ref, create).await {
            Ok(picture_id) => RemoteWrite::Inserted {
                picture_id,
                object_id,
            },
            Err(e) => {
                warn!(
                    owner = %self.owner,
                    object = %object_id,
                    image = %image_ref,
                    error = %e,
                    "object saved locally but remote write failed"
                );
                RemoteWrite::Failed(e.to_string())
            }
        };

        info!(owner = %self.owner, object = %object_id, name = %name, "object saved");
        Ok(SaveOutcome {
            object_id,
            cache,
            remote,
        })
    }

    /// Look up or create the picture, then insert the object. Returns the
    /// picture id. Lookup and creation are separate calls, so two devices
    /// racing on a new image can both create a picture.
    async fn upsert_remote(&self, image_ref: &str, mut create: CreateObject) -> Result<Uuid> {
        let picture = match self.remote.find_picture(self.owner, image_ref).await? {
            Some(picture) => picture,
            None => {
                let picture = self
                    .remote
                    .create_picture(
                        self.owner,
                        &CreatePicture {
                            image_ref: image_ref.to_string(),
                            display_name: None,
                            description: None,
                        },
                    )
                    .await?;
                debug!(owner = %self.owner, picture = %picture.id, "created remote picture");
                picture
            }
        };

        create.picture_id = picture.id;
        self.remote.insert_object(self.owner, &create).await?;
        Ok(picture.id)
    }

    // ------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------

    /// Clear-and-replace the local cache from the backend.
    ///
    /// The whole cache key is rewritten, so entries of other owners go too.
    /// If the fetch fails the cache is left as it was. An unreadable cache
    /// blob is overwritten.
    pub async fn sync(&self) -> Result<SyncReport> {
        let remote = self.remote.list_objects(self.owner).await?;

        let entries: Vec<CachedObject> = remote
            .into_iter()
            .filter(|view| view.owner_id == self.owner)
            .map(CachedObject::from)
            .collect();
        let synced_at = Utc::now();

        let dropped_local = {
            let _guard = self.cache_lock.acquire().await;
            self.with_local_mut(|db| {
                let dropped = match db.cached_objects_for(self.owner) {
                    Ok(previous) => previous
                        .iter()
                        .filter(|old| !entries.iter().any(|e| e.id == old.id))
                        .count(),
                    Err(StoreError::Json(e)) => {
                        warn!(owner = %self.owner, error = %e, "local cache unreadable, overwriting");
                        0
                    }
                    Err(e) => return Err(e),
                };

                db.replace_object_cache(&entries, synced_at)?;
                Ok(dropped)
            })?
        };

        info!(
            owner = %self.owner,
            fetched = entries.len(),
            dropped_local,
            "local cache replaced from backend"
        );

        Ok(SyncReport {
            fetched: entries.len(),
            dropped_local,
            synced_at,
        })
    }

    pub fn last_sync(&self) -> Result<Option<DateTime<Utc>>> {
        self.with_local(|db| db.last_sync())
    }

    // ------------------------------------------------------------------
    // Quota
    // ------------------------------------------------------------------

    /// Whether another capture is allowed today. Read-then-decide: two
    /// captures checked at the same moment can both pass.
    pub async fn check_quota(&self) -> Result<QuotaStatus> {
        let count = self.remote.today_count(self.owner).await?;
        let status = QuotaStatus::evaluate(count, DAILY_CAPTURE_LIMIT);
        debug!(owner = %self.owner, count, can_capture = status.can_capture, "quota checked");
        Ok(status)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// The owner's objects from the backend, or from the cache when the
    /// backend is unreachable.
    pub async fn objects(&self) -> Result<ObjectListing> {
        match self.remote.list_objects(self.owner).await {
            Ok(views) => Ok(ObjectListing {
                objects: views
                    .into_iter()
                    .filter(|v| v.owner_id == self.owner)
                    .map(CachedObject::from)
                    .collect(),
                source: ListingSource::Remote,
            }),
            Err(e) => {
                warn!(owner = %self.owner, error = %e, "backend unavailable, serving cached objects");
                let objects = self.with_local(|db| db.cached_objects_for(self.owner))?;
                Ok(ObjectListing {
                    objects,
                    source: ListingSource::Cache,
                })
            }
        }
    }

    pub async fn pictures(&self) -> Result<Vec<PictureWithObjects>> {
        self.remote.list_pictures(self.owner).await
    }

    pub async fn search(&self, query: &str) -> Result<Vec<PictureWithObjects>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.remote.search_pictures(self.owner, query.trim()).await
    }

    // ------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------

    pub async fn update_picture(&self, picture_id: Uuid, update: &UpdatePicture) -> Result<Picture> {
        let picture = self.remote.update_picture(self.owner, picture_id, update).await?;
        info!(owner = %self.owner, picture = %picture_id, "picture metadata updated");
        Ok(picture)
    }

    /// Rename remotely, then rename the matching cache entry.
    pub async fn rename_object(&self, object_id: Uuid, name: &str) -> Result<TaggedObject> {
        let name = normalize_name(name).ok_or(ClientError::InvalidName)?;
        let object = self.remote.rename_object(self.owner, object_id, &name).await?;

        let _guard = self.cache_lock.acquire().await;
        self.with_local(|db| {
            let mut entries = db.load_object_cache()?;
            let mut changed = false;
            for entry in entries
                .iter_mut()
                .filter(|e| e.id == object_id && e.owner_id == self.owner)
            {
                entry.name = object.name.clone();
                changed = true;
            }
            if changed {
                db.store_object_cache(&entries)?;
            }
            Ok(())
        })?;

        info!(owner = %self.owner, object = %object_id, name = %object.name, "object renamed");
        Ok(object)
    }

    /// Soft-delete a picture and its objects remotely, then drop the
    /// picture's entries from the cache.
    pub async fn delete_picture(&self, picture: &Picture) -> Result<SoftDeleteStats> {
        let stats = self.remote.soft_delete_picture(self.owner, picture.id).await?;

        let _guard = self.cache_lock.acquire().await;
        let removed = self.with_local(|db| {
            let mut entries = db.load_object_cache()?;
            let before = entries.len();
            entries.retain(|e| !(e.owner_id == self.owner && e.image_ref == picture.image_ref));
            let removed = before - entries.len();
            if removed > 0 {
                db.store_object_cache(&entries)?;
            }
            Ok(removed)
        })?;

        info!(
            owner = %self.owner,
            picture = %picture.id,
            objects = stats.objects,
            cache_removed = removed,
            "picture deleted"
        );
        Ok(stats)
    }

    /// Cached entries of this owner, without touching the network.
    pub fn cached_objects(&self) -> Result<Vec<CachedObject>> {
        self.with_local(|db| db.cached_objects_for(self.owner))
    }
}
