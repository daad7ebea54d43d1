//! ComicVine API client.
//!
//! ### Behaviour
//!
//! - **Endpoint**: `{base_url}{path}`, default base `https://comicvine.gamespot.com`.
//! - **Authentication**: the configured `api_key` is appended only when the
//!   caller did not send one; `format=json` likewise.
//! - **Timeouts**: one per call, no retries.
//! - **Images**: fetched with the same client, capped at `max_image_bytes`.

pub mod request;
pub mod response;

use std::time::{Duration, Instant};

use cvproxy_core::store::hash::canonicalize_url;
use cvproxy_core::{AppConfig, Error, QueryParams};
use reqwest::header;
use serde_json::Value;

use crate::upstream::{FetchedImage, Upstream};

/// Default base URL for the ComicVine API.
const DEFAULT_BASE_URL: &str = "https://comicvine.gamespot.com";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "comicvine-proxy/0.1";

/// Content type assumed for images served without one.
const FALLBACK_IMAGE_TYPE: &str = "application/octet-stream";

/// ComicVine client configuration.
#[derive(Debug, Clone)]
pub struct ComicVineConfig {
    /// Key appended when the caller omits `api_key`.
    pub api_key: Option<String>,
    /// Base URL (default: https://comicvine.gamespot.com).
    pub base_url: String,
    /// Request timeout (default: 30s).
    pub timeout: Duration,
    /// User-agent string (default: comicvine-proxy/0.1).
    pub user_agent: String,
    /// Maximum image size in bytes (default: 10MB).
    pub max_image_bytes: usize,
}

impl Default for ComicVineConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_image_bytes: 10 * 1024 * 1024,
        }
    }
}

impl From<&AppConfig> for ComicVineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            api_key: config.api_key().map(str::to_string),
            base_url: config.upstream_base_url.clone(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
            max_image_bytes: config.max_image_bytes,
        }
    }
}

/// ComicVine API client.
#[derive(Debug, Clone)]
pub struct ComicVineClient {
    http: reqwest::Client,
    config: ComicVineConfig,
}

impl ComicVineClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ComicVineConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::UpstreamUnavailable {
                message: format!("failed to build HTTP client: {e}"),
                timeout: false,
            })?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &ComicVineConfig {
        &self.config
    }
}

fn content_type(headers: &header::HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[async_trait::async_trait]
impl Upstream for ComicVineClient {
    async fn fetch_json(&self, path: &str, query: &QueryParams) -> Result<Value, Error> {
        let query = request::outbound_query(query, self.config.api_key.as_deref());
        let url = request::endpoint(&self.config.base_url, path, &query)?;
        let start = Instant::now();

        tracing::debug!(url = %request::redacted(&url), "fetching from upstream");

        let http_response = self
            .http
            .get(url.clone())
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(response::network_error)?;

        let status = http_response.status();
        let content_type = content_type(http_response.headers());
        let bytes = http_response.bytes().await.map_err(response::network_error)?;

        tracing::debug!(
            url = %request::redacted(&url),
            status = status.as_u16(),
            bytes = bytes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "upstream responded"
        );

        response::check_status(status, content_type.as_deref(), &bytes)?;
        response::parse_json(&bytes)
    }

    async fn fetch_image(&self, url: &str) -> Result<FetchedImage, Error> {
        let url = canonicalize_url(url)?;
        let max_bytes = self.config.max_image_bytes;

        let http_response = self.http.get(url.clone()).send().await.map_err(response::network_error)?;

        let status = http_response.status();
        let content_type = content_type(http_response.headers());

        if let Some(len) = http_response.content_length()
            && len as usize > max_bytes
        {
            return Err(Error::UpstreamInvalid(format!("image of {len} bytes exceeds {max_bytes}")));
        }

        let bytes = http_response.bytes().await.map_err(response::network_error)?;
        response::check_status(status, content_type.as_deref(), &bytes)?;

        if bytes.len() > max_bytes {
            return Err(Error::UpstreamInvalid(format!("image of {} bytes exceeds {max_bytes}", bytes.len())));
        }

        tracing::debug!(url = %url, bytes = bytes.len(), "fetched image");

        Ok(FetchedImage { bytes, content_type: content_type.unwrap_or_else(|| FALLBACK_IMAGE_TYPE.to_string()) })
    }
}
