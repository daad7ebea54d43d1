//! Content-addressed image storage.

use super::connection::Store;
use super::hash::{image_key, is_valid_hash};
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored image and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub url_hash: String,
    pub source_url: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub created_at: String,
}

impl Store {
    /// Store image bytes under the hash of their canonical source URL.
    ///
    /// Returns the hash. Storing the same URL again replaces the bytes.
    pub async fn put_image(&self, source_url: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, Error> {
        let url_hash = image_key(source_url)?;
        let hash = url_hash.clone();
        let source_url = source_url.trim().to_string();
        let content_type = content_type.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO images (url_hash, source_url, content_type, bytes, size, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(url_hash) DO UPDATE SET
                        source_url = excluded.source_url,
                        content_type = excluded.content_type,
                        bytes = excluded.bytes,
                        size = excluded.size",
                    params![hash, source_url, content_type, bytes, bytes.len() as i64, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(url_hash)
    }

    /// Get an image by hash.
    ///
    /// Returns None if no image is stored under the hash.
    pub async fn get_image(&self, url_hash: &str) -> Result<Option<ImageAsset>, Error> {
        if !is_valid_hash(url_hash) {
            return Err(Error::InvalidHash);
        }
        let url_hash = url_hash.to_string();
        self.conn
            .call(move |conn| -> Result<Option<ImageAsset>, Error> {
                let result = conn.query_row(
                    "SELECT url_hash, source_url, bytes, content_type, created_at
                     FROM images WHERE url_hash = ?1",
                    params![url_hash],
                    |row| {
                        Ok(ImageAsset {
                            url_hash: row.get(0)?,
                            source_url: row.get(1)?,
                            bytes: row.get(2)?,
                            content_type: row.get(3)?,
                            created_at: row.get(4)?,
                        })
                    },
                );

                match result {
                    Ok(asset) => Ok(Some(asset)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Check whether an image is stored, without loading its bytes.
    pub async fn has_image(&self, url_hash: &str) -> Result<bool, Error> {
        if !is_valid_hash(url_hash) {
            return Err(Error::InvalidHash);
        }
        let url_hash = url_hash.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM images WHERE url_hash = ?1)",
                        params![url_hash],
                        |row| row.get(0),
                    )
                    .map_err(Error::from)?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every stored image.
    ///
    /// Returns the number of deleted images.
    pub async fn purge_images(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM images", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
