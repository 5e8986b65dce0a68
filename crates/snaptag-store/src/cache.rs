//! On-device key-value storage and the object cache kept in it.
//!
//! The whole cache is a single JSON array stored under
//! [`OBJECT_CACHE_KEY`]; the time of the last successful sync lives under
//! [`LAST_SYNC_KEY`]. Callers serialize read-modify-write sequences
//! themselves.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use snaptag_shared::constants::{LAST_SYNC_KEY, OBJECT_CACHE_KEY};
use snaptag_shared::OwnerId;

use crate::database::{fmt_ts, Database};
use crate::error::Result;
use crate::models::CachedObject;

const UPSERT_KV: &str = "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Raw key-value access
    // ------------------------------------------------------------------

    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn()
            .execute(UPSERT_KV, params![key, value, fmt_ts(&Utc::now())])?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Object cache
    // ------------------------------------------------------------------

    /// Every cached entry, for every owner.
    pub fn load_object_cache(&self) -> Result<Vec<CachedObject>> {
        match self.kv_get(OBJECT_CACHE_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    /// Cached entries of one owner.
    pub fn cached_objects_for(&self, owner: OwnerId) -> Result<Vec<CachedObject>> {
        let mut entries = self.load_object_cache()?;
        entries.retain(|e| e.owner_id == owner);
        Ok(entries)
    }

    /// Overwrite the whole cache blob.
    pub fn store_object_cache(&self, entries: &[CachedObject]) -> Result<()> {
        let json = serde_json::to_string(entries)?;
        self.kv_set(OBJECT_CACHE_KEY, &json)
    }

    /// Replace the whole cache blob and record the sync time, in one
    /// transaction.
    pub fn replace_object_cache(&mut self, entries: &[CachedObject], synced_at: DateTime<Utc>) -> Result<()> {
        let json = serde_json::to_string(entries)?;
        let now = fmt_ts(&Utc::now());

        let tx = self.conn_mut().transaction()?;
        tx.execute(UPSERT_KV, params![OBJECT_CACHE_KEY, json, now])?;
        tx.execute(UPSERT_KV, params![LAST_SYNC_KEY, fmt_ts(&synced_at), now])?;
        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Last sync
    // ------------------------------------------------------------------

    pub fn last_sync(&self) -> Result<Option<DateTime<Utc>>> {
        match self.kv_get(LAST_SYNC_KEY)? {
            Some(raw) => Ok(Some(DateTime::parse_from_rfc3339(&raw)?.with_timezone(&Utc))),
            None => Ok(None),
        }
    }

}
