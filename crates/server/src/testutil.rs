//! Shared test helpers: a scripted upstream and store fixtures.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use cvproxy_client::{FetchedImage, Upstream};
use cvproxy_core::{AppConfig, Error, QueryParams, Store};
use serde_json::Value;

use crate::routes::AppState;

/// Canned reply for one upstream path.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Rejected(u16, &'static str),
    Down { timeout: bool },
}

/// Upstream double that answers from a script and counts calls.
#[derive(Default)]
pub struct FakeUpstream {
    replies: Mutex<HashMap<String, Reply>>,
    images: Mutex<HashMap<String, FetchedImage>>,
    queries: Mutex<Vec<QueryParams>>,
    json_calls: AtomicUsize,
    image_calls: AtomicUsize,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json(self, path: &str, body: Value) -> Self {
        self.with_reply(path, Reply::Json(body))
    }

    pub fn with_reply(self, path: &str, reply: Reply) -> Self {
        self.replies.lock().unwrap().insert(path.to_string(), reply);
        self
    }

    pub fn with_image(self, url: &str, bytes: &'static [u8], content_type: &str) -> Self {
        self.images.lock().unwrap().insert(
            url.to_string(),
            FetchedImage { bytes: Bytes::from_static(bytes), content_type: content_type.to_string() },
        );
        self
    }

    pub fn json_calls(&self) -> usize {
        self.json_calls.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<QueryParams> {
        self.queries.lock().unwrap().last().cloned()
    }
}

#[async_trait::async_trait]
impl Upstream for FakeUpstream {
    async fn fetch_json(&self, path: &str, query: &QueryParams) -> Result<Value, Error> {
        self.json_calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.clone());
        let reply = self.replies.lock().unwrap().get(path).cloned();
        match reply {
            Some(Reply::Json(body)) => Ok(body),
            Some(Reply::Rejected(status, body)) => Err(Error::UpstreamRejected {
                status,
                body: body.as_bytes().to_vec(),
                content_type: Some("application/json".into()),
            }),
            Some(Reply::Down { timeout }) => Err(Error::UpstreamUnavailable { message: "scripted outage".into(), timeout }),
            None => Err(Error::UpstreamRejected { status: 404, body: b"{}".to_vec(), content_type: None }),
        }
    }

    async fn fetch_image(&self, url: &str) -> Result<FetchedImage, Error> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.images
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::UpstreamUnavailable { message: format!("no scripted image for {url}"), timeout: false })
    }
}

/// App state over an in-memory store and the given upstream.
pub async fn test_state(upstream: Arc<FakeUpstream>) -> (Arc<AppState>, Store) {
    let store = Store::open_in_memory().await.unwrap();
    let config = AppConfig { api_key: Some("test-key".into()), ..Default::default() };
    let state = AppState::new(store.clone(), upstream, &config);
    (Arc::new(state), store)
}

/// A file-backed store whose `table` has been dropped behind its back, so
/// every operation touching it fails.
pub async fn broken_store(table: &str) -> (Store, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.sqlite");
    let store = Store::open(&path).await.unwrap();
    let raw = tokio_rusqlite::rusqlite::Connection::open(&path).unwrap();
    raw.execute_batch(&format!("DROP TABLE \"{table}\"")).unwrap();
    (store, dir)
}

/// Write a snapshot database built from `sql` and return its path.
pub fn write_snapshot(dir: &tempfile::TempDir, sql: &str) -> std::path::PathBuf {
    let path = dir.path().join("snapshot.sqlite");
    let raw = tokio_rusqlite::rusqlite::Connection::open(&path).unwrap();
    raw.execute_batch(sql).unwrap();
    path
}
