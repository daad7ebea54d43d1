//! Cached upstream responses.
//!
//! One row per `(resource_type, resource_id)`; writes are upserts so the last
//! write wins and concurrent writers for the same key never duplicate rows.

use super::connection::Store;
use crate::resource::{ResourceKey, ResourceType};
use crate::Error;
use serde_json::Value;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A cached upstream payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: ResourceKey,
    pub payload: Value,
    /// RFC 3339 timestamp of the last write.
    pub cached_at: String,
}

impl Store {
    /// Insert or replace the cached payload for `key`.
    pub async fn put_entry(&self, key: &ResourceKey, payload: &Value) -> Result<(), Error> {
        let resource_type = key.resource_type.as_str();
        let resource_id = key.resource_id.clone();
        let data = serde_json::to_string(payload).map_err(|e| Error::InvalidInput(e.to_string()))?;
        let cached_at = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO api_cache (resource_type, resource_id, response_data, cached_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(resource_type, resource_id) DO UPDATE SET
                        response_data = excluded.response_data,
                        cached_at = excluded.cached_at",
                    params![resource_type, resource_id, data, cached_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the cached payload for `key`.
    ///
    /// Returns None if nothing is cached under the key.
    pub async fn get_entry(&self, key: &ResourceKey) -> Result<Option<CacheEntry>, Error> {
        let lookup = key.clone();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<(String, String)>, Error> {
                let result = conn.query_row(
                    "SELECT response_data, cached_at FROM api_cache
                     WHERE resource_type = ?1 AND resource_id = ?2",
                    params![lookup.resource_type.as_str(), lookup.resource_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                );

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        let Some((data, cached_at)) = row else {
            return Ok(None);
        };
        let payload = serde_json::from_str(&data)
            .map_err(|e| Error::StoreCorrupt(format!("{}/{}: {e}", key.resource_type, key.resource_id)))?;

        Ok(Some(CacheEntry { key: key.clone(), payload, cached_at }))
    }

    /// Delete cached entries, optionally only those of one resource type.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_entries(&self, resource_type: Option<ResourceType>) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = match resource_type {
                    Some(rt) => conn.execute("DELETE FROM api_cache WHERE resource_type = ?1", params![rt.as_str()])?,
                    None => conn.execute("DELETE FROM api_cache", [])?,
                };
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
