//! CRUD operations for [`Picture`] rows.
//!
//! Every read excludes soft-deleted rows and is scoped to one owner.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use snaptag_shared::protocol::{SoftDeleteStats, UpdatePicture};
use snaptag_shared::OwnerId;

use crate::database::{fmt_ts, parse_ts, parse_uuid, Database};
use crate::error::{not_found, Result, StoreError};
use crate::models::{Picture, PictureWithObjects};

const PICTURE_COLUMNS: &str =
    "id, owner_id, image_ref, display_name, description, is_deleted, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new picture.
    pub fn insert_picture(&self, picture: &Picture) -> Result<()> {
        if picture.image_ref.trim().is_empty() {
            return Err(StoreError::Invalid("image_ref must not be empty".into()));
        }

        self.conn().execute(
            "INSERT INTO pictures (id, owner_id, image_ref, display_name, description, is_deleted, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                picture.id.to_string(),
                picture.owner_id.to_string(),
                picture.image_ref,
                picture.display_name,
                picture.description,
                picture.is_deleted as i32,
                fmt_ts(&picture.created_at),
                fmt_ts(&picture.updated_at),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a live picture by id.
    pub fn get_picture(&self, owner: OwnerId, id: Uuid) -> Result<Picture> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {PICTURE_COLUMNS} FROM pictures
                     WHERE id = ?1 AND owner_id = ?2 AND is_deleted = 0"
                ),
                params![id.to_string(), owner.to_string()],
                row_to_picture,
            )
            .map_err(not_found)
    }

    /// Look up the live picture for an image reference, if any.
    ///
    /// Oldest first, so that if two concurrent creations raced the same
    /// picture keeps winning.
    pub fn find_picture_by_ref(&self, owner: OwnerId, image_ref: &str) -> Result<Option<Picture>> {
        let picture = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {PICTURE_COLUMNS} FROM pictures
                     WHERE owner_id = ?1 AND image_ref = ?2 AND is_deleted = 0
                     ORDER BY created_at ASC
                     LIMIT 1"
                ),
                params![owner.to_string(), image_ref],
                row_to_picture,
            )
            .optional()?;
        Ok(picture)
    }

    /// List the owner's live pictures with their live objects, newest first.
    pub fn list_pictures(&self, owner: OwnerId) -> Result<Vec<PictureWithObjects>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {PICTURE_COLUMNS} FROM pictures
             WHERE owner_id = ?1 AND is_deleted = 0
             ORDER BY created_at DESC"
        ))?;

        let rows = stmt.query_map(params![owner.to_string()], row_to_picture)?;

        let mut pictures = Vec::new();
        for row in rows {
            pictures.push(row?);
        }
        self.attach_objects(pictures)
    }

    /// Live pictures having at least one live object whose name contains
    /// `query`, newest first. Both sides are compared in Unicode lowercase.
    pub fn search_pictures(&self, owner: OwnerId, query: &str) -> Result<Vec<PictureWithObjects>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut pictures = self.list_pictures(owner)?;
        pictures.retain(|p| p.objects.iter().any(|o| o.name.to_lowercase().contains(&needle)));
        Ok(pictures)
    }

    /// Count pictures the owner created in `[start, end)`.
    ///
    /// Soft-deleted pictures are included: deleting a capture does not give
    /// back quota.
    pub fn count_pictures_created_between(
        &self,
        owner: OwnerId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u32> {
        let count: u32 = self.conn().query_row(
            "SELECT COUNT(*) FROM pictures
             WHERE owner_id = ?1 AND created_at >= ?2 AND created_at < ?3",
            params![owner.to_string(), fmt_ts(&start), fmt_ts(&end)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Apply a partial metadata update and return the updated picture.
    pub fn update_picture(
        &self,
        owner: OwnerId,
        id: Uuid,
        update: &UpdatePicture,
        now: DateTime<Utc>,
    ) -> Result<Picture> {
        let affected = self.conn().execute(
            "UPDATE pictures
             SET display_name = COALESCE(?3, display_name),
                 description  = COALESCE(?4, description),
                 updated_at   = ?5
             WHERE id = ?1 AND owner_id = ?2 AND is_deleted = 0",
            params![
                id.to_string(),
                owner.to_string(),
                update.display_name,
                update.description,
                fmt_ts(&now),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_picture(owner, id)
    }

    // ------------------------------------------------------------------
    // Soft delete
    // ------------------------------------------------------------------

    /// Flip the soft-delete flag of a picture and all of its objects in one
    /// transaction. Rows are never physically removed.
    pub fn soft_delete_picture(
        &mut self,
        owner: OwnerId,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<SoftDeleteStats> {
        let tx = self.conn_mut().transaction()?;

        let pictures = tx.execute(
            "UPDATE pictures SET is_deleted = 1, updated_at = ?3
             WHERE id = ?1 AND owner_id = ?2 AND is_deleted = 0",
            params![id.to_string(), owner.to_string(), fmt_ts(&now)],
        )?;
        if pictures == 0 {
            return Err(StoreError::NotFound);
        }

        let objects = tx.execute(
            "UPDATE objects SET is_deleted = 1, updated_at = ?2
             WHERE picture_id = ?1 AND is_deleted = 0",
            params![id.to_string(), fmt_ts(&now)],
        )?;

        tx.commit()?;

        tracing::info!(picture = %id, owner = %owner, objects, "picture soft-deleted");
        Ok(SoftDeleteStats { pictures, objects })
    }

    fn attach_objects(&self, pictures: Vec<Picture>) -> Result<Vec<PictureWithObjects>> {
        pictures
            .into_iter()
            .map(|picture| {
                let objects = self.list_objects_for_picture(picture.id)?;
                Ok(PictureWithObjects { picture, objects })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Picture`].
fn row_to_picture(row: &rusqlite::Row<'_>) -> rusqlite::Result<Picture> {
    let id_str: String = row.get(0)?;
    let owner_str: String = row.get(1)?;
    let image_ref: String = row.get(2)?;
    let display_name: Option<String> = row.get(3)?;
    let description: Option<String> = row.get(4)?;
    let is_deleted: i32 = row.get(5)?;
    let created_str: String = row.get(6)?;
    let updated_str: String = row.get(7)?;

    Ok(Picture {
        id: parse_uuid(0, &id_str)?,
        owner_id: OwnerId(parse_uuid(1, &owner_str)?),
        image_ref,
        display_name,
        description,
        is_deleted: is_deleted != 0,
        created_at: parse_ts(6, &created_str)?,
        updated_at: parse_ts(7, &updated_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaggedObject;
    use chrono::Duration;

    fn test_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("pictures.db")).unwrap();
        (db, dir)
    }

    fn picture(owner: OwnerId, image_ref: &str, created_at: DateTime<Utc>) -> Picture {
        Picture {
            id: Uuid::new_v4(),
            owner_id: owner,
            image_ref: image_ref.to_string(),
            display_name: None,
            description: None,
            is_deleted: false,
            created_at,
            updated_at: created_at,
        }
    }

    fn object(picture_id: Uuid, name: &str) -> TaggedObject {
        let now = Utc::now();
        TaggedObject {
            id: Uuid::new_v4(),
            picture_id,
            name: name.to_string(),
            x: Some(10.0),
            y: Some(20.0),
            has_ai_coordinates: true,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn insert_and_find_by_ref() {
        let (db, _dir) = test_db();
        let owner = OwnerId::new();
        let pic = picture(owner, "o/1.jpg", Utc::now());
        db.insert_picture(&pic).unwrap();

        let found = db.find_picture_by_ref(owner, "o/1.jpg").unwrap();
        assert_eq!(found.map(|p| p.id), Some(pic.id));

        assert!(db.find_picture_by_ref(OwnerId::new(), "o/1.jpg").unwrap().is_none());
        assert!(db.find_picture_by_ref(owner, "o/2.jpg").unwrap().is_none());
    }

    #[test]
    fn empty_image_ref_rejected() {
        let (db, _dir) = test_db();
        let pic = picture(OwnerId::new(), "  ", Utc::now());
        assert!(matches!(db.insert_picture(&pic), Err(StoreError::Invalid(_))));
    }

    #[test]
    fn update_metadata_is_partial() {
        let (db, _dir) = test_db();
        let owner = OwnerId::new();
        let mut pic = picture(owner, "o/1.jpg", Utc::now());
        pic.description = Some("kitchen".into());
        db.insert_picture(&pic).unwrap();

        let update = UpdatePicture {
            display_name: Some("Breakfast".into()),
            description: None,
        };
        let updated = db.update_picture(owner, pic.id, &update, Utc::now()).unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("Breakfast"));
        assert_eq!(updated.description.as_deref(), Some("kitchen"));

        let other = db.update_picture(OwnerId::new(), pic.id, &update, Utc::now());
        assert!(matches!(other, Err(StoreError::NotFound)));
    }

    #[test]
    fn soft_deleted_pictures_hidden_from_reads() {
        let (mut db, _dir) = test_db();
        let owner = OwnerId::new();
        let keep = picture(owner, "o/keep.jpg", Utc::now());
        let gone = picture(owner, "o/gone.jpg", Utc::now());
        db.insert_picture(&keep).unwrap();
        db.insert_picture(&gone).unwrap();
        db.insert_object(owner, &object(keep.id, "cup")).unwrap();
        db.insert_object(owner, &object(gone.id, "cup")).unwrap();
        db.insert_object(owner, &object(gone.id, "plate")).unwrap();

        let stats = db.soft_delete_picture(owner, gone.id, Utc::now()).unwrap();
        assert_eq!(stats, SoftDeleteStats { pictures: 1, objects: 2 });

        let listed = db.list_pictures(owner).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].picture.id, keep.id);

        let found = db.search_pictures(owner, "CUP").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].picture.id, keep.id);
        assert!(db.search_pictures(owner, "plate").unwrap().is_empty());

        assert!(db.find_picture_by_ref(owner, "o/gone.jpg").unwrap().is_none());
        assert!(matches!(db.get_picture(owner, gone.id), Err(StoreError::NotFound)));
        assert!(matches!(
            db.soft_delete_picture(owner, gone.id, Utc::now()),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn search_treats_wildcards_literally() {
        let (db, _dir) = test_db();
        let owner = OwnerId::new();
        let pic = picture(owner, "o/1.jpg", Utc::now());
        db.insert_picture(&pic).unwrap();
        db.insert_object(owner, &object(pic.id, "mug")).unwrap();

        assert!(db.search_pictures(owner, "%").unwrap().is_empty());
        assert!(db.search_pictures(owner, "m_g").unwrap().is_empty());
        assert!(db.search_pictures(owner, "   ").unwrap().is_empty());
        assert_eq!(db.search_pictures(owner, "ug").unwrap().len(), 1);
    }

    #[test]
    fn search_folds_non_ascii_case() {
        let (db, _dir) = test_db();
        let owner = OwnerId::new();
        let pic = picture(owner, "o/1.jpg", Utc::now());
        db.insert_picture(&pic).unwrap();
        db.insert_object(owner, &object(pic.id, "Éclair")).unwrap();

        assert_eq!(db.search_pictures(owner, "Éclair").unwrap().len(), 1);
        assert_eq!(db.search_pictures(owner, "éclair").unwrap().len(), 1);
        assert_eq!(db.search_pictures(owner, "ÉCLAIR").unwrap().len(), 1);
        assert_eq!(db.search_pictures(owner, "clai").unwrap().len(), 1);
    }

    #[test]
    fn count_in_window_includes_deleted() {
        let (mut db, _dir) = test_db();
        let owner = OwnerId::new();
        let start = "2024-03-14T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let end = start + Duration::days(1);

        let yesterday = picture(owner, "o/y.jpg", start - Duration::seconds(1));
        let first = picture(owner, "o/a.jpg", start);
        let second = picture(owner, "o/b.jpg", start + Duration::hours(12));
        let tomorrow = picture(owner, "o/t.jpg", end);
        for p in [&yesterday, &first, &second, &tomorrow] {
            db.insert_picture(p).unwrap();
        }
        db.insert_picture(&picture(OwnerId::new(), "x/a.jpg", start)).unwrap();

        assert_eq!(db.count_pictures_created_between(owner, start, end).unwrap(), 2);

        db.soft_delete_picture(owner, second.id, Utc::now()).unwrap();
        assert_eq!(db.count_pictures_created_between(owner, start, end).unwrap(), 2);
    }
}
