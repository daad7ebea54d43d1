//! SQLite-backed store for cached responses, images and imported tables.
//!
//! This module provides a persistent store using SQLite with async access via
//! tokio-rusqlite. It holds:
//!
//! - `api_cache`: raw upstream payloads keyed by resource
//! - `images`: content-addressed image bytes
//! - `cv_*`: locally imported resource tables, read-only to the pipeline

pub mod connection;
pub mod entries;
pub mod hash;
pub mod images;
pub mod import;
pub mod local;
pub mod migrations;
pub mod stats;

pub use crate::Error;

pub use connection::Store;
pub use entries::CacheEntry;
pub use images::ImageAsset;
pub use import::{ImportFailure, ImportSummary, TableImport};
pub use local::ListPage;
pub use stats::StoreStats;
