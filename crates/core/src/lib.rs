//! Core types and shared functionality for comicvine-proxy.
//!
//! This crate provides:
//! - Resource identifiers and the upstream field mapping
//! - SQLite store: response cache, image store and imported local tables
//! - Snapshot importer
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod payload;
pub mod resource;
pub mod store;

pub use config::AppConfig;
pub use error::Error;
pub use resource::{QueryParams, ResourceKey, ResourceRequest, ResourceType};
pub use store::Store;
