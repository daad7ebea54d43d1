//! The remote data source seen by the pipeline.

use bytes::Bytes;
use cvproxy_core::{Error, QueryParams};
use serde_json::Value;

/// An image downloaded from an allowed host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Bytes,
    pub content_type: String,
}

/// Remote API the proxy falls back to on a local and cache miss.
///
/// Implementations must not retry; failures are reported through the shared
/// error taxonomy (`UpstreamUnavailable`, `UpstreamRejected`, `UpstreamInvalid`).
#[async_trait::async_trait]
pub trait Upstream: Send + Sync {
    /// Fetch the JSON document at `path` (e.g. `/api/issue/4000-1/`).
    async fn fetch_json(&self, path: &str, query: &QueryParams) -> Result<Value, Error>;

    /// Download the bytes behind an absolute image URL.
    async fn fetch_image(&self, url: &str) -> Result<FetchedImage, Error>;
}
