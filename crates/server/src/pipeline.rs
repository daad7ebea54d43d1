//! Tiered read-through resolution.
//!
//! Tiers are consulted in a fixed order: imported local tables, the response
//! cache, then the upstream API. A miss in one tier falls through to the next;
//! a store or upstream failure stops the request.

use std::sync::Arc;

use cvproxy_client::Upstream;
use cvproxy_core::payload::{detail_envelope, project_fields};
use cvproxy_core::resource::parse_request;
use cvproxy_core::store::ListPage;
use cvproxy_core::{Error, ResourceRequest, Store};
use serde_json::Value;

use crate::annotate::{Annotator, DataSource};

/// An annotated response body and the tier that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub source: DataSource,
    pub body: Value,
}

#[derive(Clone)]
pub struct Pipeline {
    store: Store,
    upstream: Arc<dyn Upstream>,
    annotator: Arc<Annotator>,
}

impl Pipeline {
    pub fn new(store: Store, upstream: Arc<dyn Upstream>, annotator: Arc<Annotator>) -> Self {
        Self { store, upstream, annotator }
    }

    /// Resolve an inbound `/api/...` path and query.
    pub async fn resolve(&self, path: &str, raw_query: Option<&str>) -> Result<Resolved, Error> {
        let request = parse_request(path, raw_query)?;
        let (source, mut body) = self.lookup(&request).await?;

        if source != DataSource::ComicvineApi
            && let Some(fields) = request.query().field_list()
        {
            project_fields(&mut body, &fields);
        }

        let body = self.annotator.annotate(body, source).await?;
        Ok(Resolved { source, body })
    }

    async fn lookup(&self, request: &ResourceRequest) -> Result<(DataSource, Value), Error> {
        let resource_type = request.resource_type();

        if let Some(body) = self.local(request).await? {
            tracing::debug!(%resource_type, "local table hit");
            return Ok((DataSource::LocalDatabaseTable, body));
        }

        let key = request.cache_key();
        if let Some(entry) = self.store.get_entry(&key).await? {
            tracing::debug!(%resource_type, resource_id = %key.resource_id, "cache hit");
            return Ok((DataSource::ApiCache, entry.payload));
        }

        tracing::debug!(%resource_type, resource_id = %key.resource_id, "cache miss");
        let body = self.upstream.fetch_json(&request.upstream_path(), request.query()).await?;

        self.store.put_entry(&key, &body).await?;

        Ok((DataSource::ComicvineApi, body))
    }

    async fn local(&self, request: &ResourceRequest) -> Result<Option<Value>, Error> {
        match request {
            ResourceRequest::Detail { key, .. } => Ok(self.store.local_lookup(key).await?.map(detail_envelope)),
            ResourceRequest::List { resource_type, query } => {
                Ok(self.store.local_list(*resource_type, query).await?.map(ListPage::into_envelope))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakeUpstream, Reply, broken_store, write_snapshot};
    use cvproxy_core::{ResourceKey, ResourceType};
    use serde_json::json;

    const THUMB: &str = "https://comicvine.gamespot.com/a/uploads/thumb/9.jpg";

    fn pipeline(store: &Store, upstream: Arc<FakeUpstream>) -> Pipeline {
        let hosts = vec!["comicvine.gamespot.com".to_string()];
        let annotator = Arc::new(Annotator::new(store.clone(), upstream.clone(), &hosts, ""));
        Pipeline::new(store.clone(), upstream, annotator)
    }

    fn issue_body(id: u64, name: &str) -> Value {
        json!({"error": "OK", "status_code": 1, "results": {"id": id, "name": name}})
    }

    #[tokio::test]
    async fn test_local_hit_skips_upstream() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_in_memory().await.unwrap();
        let snapshot = write_snapshot(&dir, "CREATE TABLE cv_issue (id INTEGER, name TEXT); INSERT INTO cv_issue VALUES (1, 'Local');");
        store.import_snapshot(&snapshot).await.unwrap();
        let upstream = Arc::new(FakeUpstream::new().with_json("/api/issue/4000-1/", issue_body(1, "Remote")));

        let resolved = pipeline(&store, upstream.clone()).resolve("/api/issue/4000-1", None).await.unwrap();

        assert_eq!(resolved.source, DataSource::LocalDatabaseTable);
        assert_eq!(resolved.body["results"]["name"], "Local");
        assert_eq!(resolved.body["_source"], "local_database_table");
        assert_eq!(upstream.json_calls(), 0);
    }

    #[tokio::test]
    async fn test_local_hit_from_data_column_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_in_memory().await.unwrap();
        let snapshot = write_snapshot(
            &dir,
            r#"CREATE TABLE cv_issue (id INTEGER PRIMARY KEY, data JSON);
               INSERT INTO cv_issue VALUES (1, '{"id":1,"name":"Real Name"}');"#,
        );
        store.import_snapshot(&snapshot).await.unwrap();
        let upstream = Arc::new(FakeUpstream::new());

        let resolved = pipeline(&store, upstream.clone()).resolve("/api/issue/4000-1", None).await.unwrap();

        assert_eq!(resolved.source, DataSource::LocalDatabaseTable);
        assert_eq!(resolved.body["results"]["name"], "Real Name");
        assert_eq!(upstream.json_calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_upstream() {
        let store = Store::open_in_memory().await.unwrap();
        store.put_entry(&ResourceKey::detail(ResourceType::Issue, 2), &issue_body(2, "Cached")).await.unwrap();
        let upstream = Arc::new(FakeUpstream::new());

        let resolved = pipeline(&store, upstream.clone()).resolve("/api/issue/4000-2/", None).await.unwrap();

        assert_eq!(resolved.source, DataSource::ApiCache);
        assert_eq!(resolved.body["results"]["name"], "Cached");
        assert_eq!(resolved.body["_source"], "api_cache");
        assert_eq!(upstream.json_calls(), 0);
    }

    #[tokio::test]
    async fn test_miss_fetches_once_then_serves_from_cache() {
        let store = Store::open_in_memory().await.unwrap();
        let upstream = Arc::new(FakeUpstream::new().with_json("/api/issue/4000-3/", issue_body(3, "Remote")));
        let pipeline = pipeline(&store, upstream.clone());

        let first = pipeline.resolve("/api/issue/4000-3", Some("api_key=client")).await.unwrap();
        assert_eq!(first.source, DataSource::ComicvineApi);
        assert_eq!(first.body["_source"], "comicvine_api");
        assert_eq!(upstream.json_calls(), 1);

        let entry = store.get_entry(&ResourceKey::detail(ResourceType::Issue, 3)).await.unwrap().unwrap();
        assert_eq!(entry.payload, issue_body(3, "Remote"));

        let second = pipeline.resolve("/api/issue/4000-3", Some("api_key=client")).await.unwrap();
        assert_eq!(second.source, DataSource::ApiCache);
        assert_eq!(upstream.json_calls(), 1);
    }

    #[tokio::test]
    async fn test_query_forwarded_verbatim() {
        let store = Store::open_in_memory().await.unwrap();
        let upstream = Arc::new(FakeUpstream::new().with_json("/api/volumes/", json!({"status_code": 1, "results": []})));

        pipeline(&store, upstream.clone())
            .resolve("/api/volumes", Some("filter=name:Batman&api_key=mine"))
            .await
            .unwrap();

        let query = upstream.last_query().unwrap();
        assert_eq!(query.to_query_string(), "filter=name%3ABatman&api_key=mine");
    }

    #[tokio::test]
    async fn test_list_cache_keyed_by_query() {
        let store = Store::open_in_memory().await.unwrap();
        let upstream = Arc::new(FakeUpstream::new().with_json("/api/volumes/", json!({"status_code": 1, "results": []})));
        let pipeline = pipeline(&store, upstream.clone());

        pipeline.resolve("/api/volumes", Some("filter=name:a")).await.unwrap();
        pipeline.resolve("/api/volumes", Some("filter=name:b")).await.unwrap();
        let repeat = pipeline.resolve("/api/volumes/", Some("api_key=other&filter=name:a")).await.unwrap();

        assert_eq!(upstream.json_calls(), 2);
        assert_eq!(repeat.source, DataSource::ApiCache);
    }

    #[tokio::test]
    async fn test_local_list_served_when_rows_exist() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_in_memory().await.unwrap();
        let snapshot = write_snapshot(
            &dir,
            "CREATE TABLE cv_volume (id INTEGER, name TEXT); INSERT INTO cv_volume VALUES (1, 'Batman'), (2, 'Superman');",
        );
        store.import_snapshot(&snapshot).await.unwrap();
        let upstream = Arc::new(FakeUpstream::new());

        let resolved = pipeline(&store, upstream.clone())
            .resolve("/api/volumes", Some("filter=name:bat&field_list=id,name"))
            .await
            .unwrap();

        assert_eq!(resolved.source, DataSource::LocalDatabaseTable);
        assert_eq!(resolved.body["number_of_total_results"], 1);
        assert_eq!(resolved.body["results"], json!([{"id": 1, "name": "Batman"}]));
        assert_eq!(upstream.json_calls(), 0);
    }

    #[tokio::test]
    async fn test_field_list_projects_cached_detail() {
        let store = Store::open_in_memory().await.unwrap();
        let body = json!({"status_code": 1, "results": {"id": 4, "name": "N", "deck": "D"}});
        store.put_entry(&ResourceKey::detail(ResourceType::Issue, 4), &body).await.unwrap();

        let resolved = pipeline(&store, Arc::new(FakeUpstream::new()))
            .resolve("/api/issue/4000-4", Some("field_list=name"))
            .await
            .unwrap();

        assert_eq!(resolved.body["results"], json!({"name": "N"}));
    }

    #[tokio::test]
    async fn test_images_annotated_and_stored() {
        let store = Store::open_in_memory().await.unwrap();
        let body = json!({"status_code": 1, "results": {"id": 9, "image": {"thumb_url": THUMB}}});
        let upstream = Arc::new(
            FakeUpstream::new()
                .with_json("/api/issue/4000-9/", body.clone())
                .with_image(THUMB, b"jpegbytes", "image/jpeg"),
        );

        let resolved = pipeline(&store, upstream).resolve("/api/issue/4000-9", None).await.unwrap();

        let local = resolved.body["results"]["image"]["thumb_url"].as_str().unwrap();
        let hash = local.strip_prefix("/images/").unwrap();
        let asset = store.get_image(hash).await.unwrap().unwrap();
        assert_eq!(asset.bytes, b"jpegbytes".to_vec());
        assert_eq!(asset.content_type, "image/jpeg");

        // The cache holds the raw payload; annotation happens per response.
        let entry = store.get_entry(&ResourceKey::detail(ResourceType::Issue, 9)).await.unwrap().unwrap();
        assert_eq!(entry.payload, body);
    }

    #[tokio::test]
    async fn test_unrecognized_path() {
        let store = Store::open_in_memory().await.unwrap();
        let upstream = Arc::new(FakeUpstream::new());
        let err = pipeline(&store, upstream.clone()).resolve("/api/comics/1", None).await.unwrap_err();
        assert!(matches!(err, Error::UnrecognizedResource(_)));
        assert_eq!(upstream.json_calls(), 0);
    }

    #[tokio::test]
    async fn test_upstream_errors_propagate_uncached() {
        let store = Store::open_in_memory().await.unwrap();
        let upstream = Arc::new(
            FakeUpstream::new()
                .with_reply("/api/issue/4000-5/", Reply::Down { timeout: true })
                .with_reply("/api/issue/4000-6/", Reply::Rejected(401, r#"{"error":"Invalid API Key"}"#)),
        );
        let pipeline = pipeline(&store, upstream);

        let err = pipeline.resolve("/api/issue/4000-5", None).await.unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable { timeout: true, .. }));
        let err = pipeline.resolve("/api/issue/4000-6", None).await.unwrap_err();
        assert!(matches!(err, Error::UpstreamRejected { status: 401, .. }));

        assert_eq!(store.cache_stats().await.unwrap().cache_entries.len(), 0);
    }

    #[tokio::test]
    async fn test_empty_result_body_is_cached() {
        let store = Store::open_in_memory().await.unwrap();
        let body = json!({"error": "Object Not Found", "status_code": 101, "results": []});
        let upstream = Arc::new(FakeUpstream::new().with_json("/api/issue/4000-8/", body.clone()));
        let pipeline = pipeline(&store, upstream.clone());

        let first = pipeline.resolve("/api/issue/4000-8", None).await.unwrap();
        assert_eq!(first.source, DataSource::ComicvineApi);
        let entry = store.get_entry(&ResourceKey::detail(ResourceType::Issue, 8)).await.unwrap().unwrap();
        assert_eq!(entry.payload, body);

        let second = pipeline.resolve("/api/issue/4000-8", None).await.unwrap();
        assert_eq!(second.source, DataSource::ApiCache);
        assert_eq!(second.body["status_code"], 101);
        assert_eq!(upstream.json_calls(), 1);
    }

    #[tokio::test]
    async fn test_store_outage_is_not_a_miss() {
        let (store, _dir) = broken_store("api_cache").await;
        let upstream = Arc::new(FakeUpstream::new().with_json("/api/issue/4000-1/", issue_body(1, "Remote")));

        let err = pipeline(&store, upstream.clone()).resolve("/api/issue/4000-1", None).await.unwrap_err();

        assert_eq!(err.code(), "STORE_UNAVAILABLE");
        assert_eq!(upstream.json_calls(), 0);
    }
}
