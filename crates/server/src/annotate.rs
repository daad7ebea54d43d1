//! Response annotation: image URL rewriting and provenance.
//!
//! Image fields are found with a walk bounded to the known image field names.
//! Every distinct URL on an allowed host is made available in the image store
//! (fetching it on first sight) and the field is rewritten to the local
//! `/images/{hash}` reference.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use cvproxy_client::Upstream;
use cvproxy_core::store::hash::image_key;
use cvproxy_core::{Error, Store};
use futures_util::stream::{self, StreamExt};
use serde_json::Value;

/// Response header carrying the same value as `_source`.
pub const DATA_SOURCE_HEADER: &str = "x-data-source";

/// Body field naming the tier that produced the response.
pub const SOURCE_FIELD: &str = "_source";

/// Keys whose string values are image URLs in upstream payloads.
const IMAGE_FIELDS: &[&str] = &[
    "icon_url",
    "medium_url",
    "screen_url",
    "screen_large_url",
    "small_url",
    "super_url",
    "thumb_url",
    "tiny_url",
    "original_url",
];

/// Image downloads in flight per response.
const MAX_CONCURRENT_IMAGES: usize = 4;

/// The tier that produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    LocalDatabaseTable,
    ApiCache,
    ComicvineApi,
}

impl DataSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DataSource::LocalDatabaseTable => "local_database_table",
            DataSource::ApiCache => "api_cache",
            DataSource::ComicvineApi => "comicvine_api",
        }
    }
}

/// Rewrites image URLs to locally served references and stamps provenance.
pub struct Annotator {
    store: Store,
    upstream: Arc<dyn Upstream>,
    image_hosts: Vec<String>,
    image_base_url: String,
}

impl Annotator {
    pub fn new(store: Store, upstream: Arc<dyn Upstream>, image_hosts: &[String], image_base_url: &str) -> Self {
        Self {
            store,
            upstream,
            image_hosts: image_hosts.iter().map(|h| h.trim().to_ascii_lowercase()).collect(),
            image_base_url: image_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Annotate `payload`, which came from `source`.
    ///
    /// Image download failures leave the affected URL unchanged; store
    /// failures abort with `StoreUnavailable`.
    pub async fn annotate(&self, mut payload: Value, source: DataSource) -> Result<Value, Error> {
        let mut urls = BTreeSet::new();
        visit_image_fields(&mut payload, &mut |value| {
            if let Some(url) = value.as_str()
                && self.is_allowed(url)
            {
                urls.insert(url.to_string());
            }
        });

        if !urls.is_empty() {
            let refs = self.ensure_images(urls).await?;
            visit_image_fields(&mut payload, &mut |value| {
                if let Some(local) = value.as_str().and_then(|url| refs.get(url)) {
                    *value = Value::String(local.clone());
                }
            });
        }

        if let Value::Object(obj) = &mut payload {
            obj.insert(SOURCE_FIELD.to_string(), Value::String(source.as_str().to_string()));
        }
        Ok(payload)
    }

    fn is_allowed(&self, raw: &str) -> bool {
        let Ok(url) = url::Url::parse(raw) else {
            return false;
        };
        matches!(url.scheme(), "http" | "https")
            && url
                .host_str()
                .is_some_and(|host| self.image_hosts.iter().any(|allowed| allowed.eq_ignore_ascii_case(host)))
    }

    /// Map each URL to its local reference, skipping URLs that could not be fetched.
    async fn ensure_images(&self, urls: BTreeSet<String>) -> Result<HashMap<String, String>, Error> {
        let results: Vec<Result<Option<(String, String)>, Error>> = stream::iter(urls)
            .map(|url| async move {
                let hash = self.ensure_image(&url).await?;
                Ok::<_, Error>(hash.map(|hash| (url, self.local_ref(&hash))))
            })
            .buffer_unordered(MAX_CONCURRENT_IMAGES)
            .collect()
            .await;

        let mut refs = HashMap::new();
        for result in results {
            if let Some((url, local)) = result? {
                refs.insert(url, local);
            }
        }
        Ok(refs)
    }

    async fn ensure_image(&self, url: &str) -> Result<Option<String>, Error> {
        let hash = match image_key(url) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(url, error = %e, "skipping unusable image URL");
                return Ok(None);
            }
        };
        if self.store.has_image(&hash).await? {
            return Ok(Some(hash));
        }

        match self.upstream.fetch_image(url).await {
            Ok(image) => {
                let stored = self.store.put_image(url, image.bytes.to_vec(), &image.content_type).await?;
                tracing::debug!(url, hash = %stored, "stored image");
                Ok(Some(stored))
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "image fetch failed; leaving URL in place");
                Ok(None)
            }
        }
    }

    fn local_ref(&self, hash: &str) -> String {
        format!("{}/images/{hash}", self.image_base_url)
    }
}

/// Call `f` on every value stored under a known image field name, at any depth.
fn visit_image_fields(value: &mut Value, f: &mut impl FnMut(&mut Value)) {
    match value {
        Value::Object(obj) => {
            for (key, child) in obj.iter_mut() {
                if IMAGE_FIELDS.contains(&key.as_str()) {
                    f(child);
                } else {
                    visit_image_fields(child, f);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                visit_image_fields(item, f);
            }
        }
        _ => {}
    }
}
