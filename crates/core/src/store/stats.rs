//! Store statistics for the admin CLI.

use std::collections::BTreeMap;

use serde::Serialize;

use super::connection::Store;
use crate::Error;
use crate::resource::RESOURCES;

/// Row counts across the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Cached responses per resource type.
    pub cache_entries: BTreeMap<String, u64>,
    /// Imported rows per local table; empty tables are omitted.
    pub local_rows: BTreeMap<String, u64>,
    pub images: u64,
    pub image_bytes: u64,
}

impl Store {
    /// Count cached entries, imported rows and stored images.
    pub async fn cache_stats(&self) -> Result<StoreStats, Error> {
        self.conn
            .call(|conn| -> Result<StoreStats, Error> {
                let mut stats = StoreStats::default();

                let mut stmt =
                    conn.prepare("SELECT resource_type, COUNT(*) FROM api_cache GROUP BY resource_type")?;
                let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
                for row in rows {
                    let (resource_type, count) = row?;
                    stats.cache_entries.insert(resource_type, count as u64);
                }

                for spec in RESOURCES {
                    let count: i64 =
                        conn.query_row(&format!("SELECT COUNT(*) FROM \"{}\"", spec.table), [], |row| row.get(0))?;
                    if count > 0 {
                        stats.local_rows.insert(spec.table.to_string(), count as u64);
                    }
                }

                let (images, image_bytes): (i64, i64) =
                    conn.query_row("SELECT COUNT(*), COALESCE(SUM(size), 0) FROM images", [], |row| {
                        Ok((row.get(0)?, row.get(1)?))
                    })?;
                stats.images = images as u64;
                stats.image_bytes = image_bytes as u64;

                Ok(stats)
            })
            .await
            .map_err(Error::from)
    }
}
