//! CRUD operations for [`TaggedObject`] rows.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use snaptag_shared::types::normalize_name;
use snaptag_shared::OwnerId;

use crate::database::{fmt_ts, parse_ts, parse_uuid, Database};
use crate::error::{not_found, Result, StoreError};
use crate::models::{ObjectView, TaggedObject};

const OBJECT_COLUMNS: &str =
    "o.id, o.picture_id, o.name, o.x, o.y, o.has_ai_coordinates, o.is_deleted, o.created_at, o.updated_at";

impl Database {
    /// Insert an object into one of the owner's live pictures.
    pub fn insert_object(&self, owner: OwnerId, object: &TaggedObject) -> Result<()> {
        let name = normalize_name(&object.name)
            .ok_or_else(|| StoreError::Invalid("object name must not be empty".into()))?;

        // Ownership and liveness of the parent picture.
        self.get_picture(owner, object.picture_id)?;

        self.conn().execute(
            "INSERT INTO objects (id, picture_id, name, x, y, has_ai_coordinates, is_deleted, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                object.id.to_string(),
                object.picture_id.to_string(),
                name,
                object.x,
                object.y,
                object.has_ai_coordinates as i32,
                object.is_deleted as i32,
                fmt_ts(&object.created_at),
                fmt_ts(&object.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Fetch a live object owned (through its picture) by `owner`.
    pub fn get_object(&self, owner: OwnerId, id: Uuid) -> Result<TaggedObject> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {OBJECT_COLUMNS}
                     FROM objects o JOIN pictures p ON p.id = o.picture_id
                     WHERE o.id = ?1 AND p.owner_id = ?2
                       AND o.is_deleted = 0 AND p.is_deleted = 0"
                ),
                params![id.to_string(), owner.to_string()],
                row_to_object,
            )
            .map_err(not_found)
    }

    /// Live objects of one picture, in insertion order.
    pub fn list_objects_for_picture(&self, picture_id: Uuid) -> Result<Vec<TaggedObject>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {OBJECT_COLUMNS}
             FROM objects o
             WHERE o.picture_id = ?1 AND o.is_deleted = 0
             ORDER BY o.created_at ASC"
        ))?;

        let rows = stmt.query_map(params![picture_id.to_string()], row_to_object)?;

        let mut objects = Vec::new();
        for row in rows {
            objects.push(row?);
        }
        Ok(objects)
    }

    /// Every live object of the owner joined with its live picture. This is
    /// the source of a clear-and-replace sync.
    pub fn list_object_views(&self, owner: OwnerId) -> Result<Vec<ObjectView>> {
        let mut stmt = self.conn().prepare(
            "SELECT o.id, o.picture_id, p.owner_id, p.image_ref, o.name, o.x, o.y,
                    o.has_ai_coordinates, o.created_at
             FROM objects o JOIN pictures p ON p.id = o.picture_id
             WHERE p.owner_id = ?1 AND o.is_deleted = 0 AND p.is_deleted = 0
             ORDER BY o.created_at ASC",
        )?;

        let rows = stmt.query_map(params![owner.to_string()], row_to_view)?;

        let mut views = Vec::new();
        for row in rows {
            views.push(row?);
        }
        Ok(views)
    }

    /// Rename a live object and return it.
    pub fn rename_object(
        &self,
        owner: OwnerId,
        id: Uuid,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<TaggedObject> {
        let name = normalize_name(name)
            .ok_or_else(|| StoreError::Invalid("object name must not be empty".into()))?;

        self.get_object(owner, id)?;

        self.conn().execute(
            "UPDATE objects SET name = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), name, fmt_ts(&now)],
        )?;
        self.get_object(owner, id)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_object(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaggedObject> {
    let id_str: String = row.get(0)?;
    let picture_str: String = row.get(1)?;
    let name: String = row.get(2)?;
    let x: Option<f32> = row.get(3)?;
    let y: Option<f32> = row.get(4)?;
    let has_ai: i32 = row.get(5)?;
    let is_deleted: i32 = row.get(6)?;
    let created_str: String = row.get(7)?;
    let updated_str: String = row.get(8)?;

    Ok(TaggedObject {
        id: parse_uuid(0, &id_str)?,
        picture_id: parse_uuid(1, &picture_str)?,
        name,
        x,
        y,
        has_ai_coordinates: has_ai != 0,
        is_deleted: is_deleted != 0,
        created_at: parse_ts(7, &created_str)?,
        updated_at: parse_ts(8, &updated_str)?,
    })
}

fn row_to_view(row: &rusqlite::Row<'_>) -> rusqlite::Result<ObjectView> {
    let id_str: String = row.get(0)?;
    let picture_str: String = row.get(1)?;
    let owner_str: String = row.get(2)?;
    let image_ref: String = row.get(3)?;
    let name: String = row.get(4)?;
    let x: Option<f32> = row.get(5)?;
    let y: Option<f32> = row.get(6)?;
    let has_ai: i32 = row.get(7)?;
    let created_str: String = row.get(8)?;

    Ok(ObjectView {
        id: parse_uuid(0, &id_str)?,
        picture_id: parse_uuid(1, &picture_str)?,
        owner_id: OwnerId(parse_uuid(2, &owner_str)?),
        image_ref,
        name,
        x,
        y,
        has_ai_coordinates: has_ai != 0,
        created_at: parse_ts(8, &created_str)?,
    })
}
