//! v001 -- Picture and object tables.

use rusqlite::Connection;

const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Pictures
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS pictures (
    id           TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    owner_id     TEXT NOT NULL,               -- UUID of the owning user
    image_ref    TEXT NOT NULL,               -- storage path or URL
    display_name TEXT,
    description  TEXT,
    is_deleted   INTEGER NOT NULL DEFAULT 0,  -- soft-delete flag 0/1
    created_at   TEXT NOT NULL,               -- RFC-3339, UTC, micros
    updated_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pictures_owner_ref
    ON pictures(owner_id, image_ref);
CREATE INDEX IF NOT EXISTS idx_pictures_owner_created
    ON pictures(owner_id, created_at);

-- ----------------------------------------------------------------
-- Objects
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS objects (
    id                 TEXT PRIMARY KEY NOT NULL,  -- UUID v4, chosen by the device
    picture_id         TEXT NOT NULL,              -- FK -> pictures(id)
    name               TEXT NOT NULL,
    x                  REAL,                       -- percent of width
    y                  REAL,                       -- percent of height
    has_ai_coordinates INTEGER NOT NULL DEFAULT 0,
    is_deleted         INTEGER NOT NULL DEFAULT 0,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL,

    FOREIGN KEY (picture_id) REFERENCES pictures(id)
);

CREATE INDEX IF NOT EXISTS idx_objects_picture ON objects(picture_id);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
