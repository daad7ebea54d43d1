//! HTTP surface: API passthrough, stored images, health.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use cvproxy_client::Upstream;
use cvproxy_core::store::hash::is_valid_hash;
use cvproxy_core::{AppConfig, Error, Store};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::annotate::{Annotator, DATA_SOURCE_HEADER};
use crate::error::{ApiError, ErrorBody};
use crate::pipeline::Pipeline;

/// Stored images never change under a given hash.
const IMAGE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Shared handler state.
pub struct AppState {
    pub pipeline: Pipeline,
    pub store: Store,
    pub api_key_configured: bool,
}

impl AppState {
    pub fn new(store: Store, upstream: Arc<dyn Upstream>, config: &AppConfig) -> Self {
        let annotator = Arc::new(Annotator::new(
            store.clone(),
            upstream.clone(),
            &config.image_hosts,
            &config.image_base_url,
        ));
        Self {
            pipeline: Pipeline::new(store.clone(), upstream, annotator),
            store,
            api_key_configured: config.api_key().is_some(),
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/*path", get(api))
        .route("/images/:hash", get(image))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    api_key: &'static str,
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "name": "comicvine-proxy",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Read-through caching proxy for the ComicVine API",
        "endpoints": {
            "api": "/api/{resource}/{prefix}-{id} or /api/{resources}",
            "images": "/images/{hash}",
            "health": "/health",
        },
        "sources": ["local_database_table", "api_cache", "comicvine_api"],
    }))
}

/// Liveness only; never touches the store or the upstream.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        api_key: if state.api_key_configured { "configured" } else { "missing" },
    })
}

async fn api(State(state): State<Arc<AppState>>, uri: Uri) -> Result<Response, ApiError> {
    let resolved = state.pipeline.resolve(uri.path(), uri.query()).await?;

    let mut response = Json(resolved.body).into_response();
    response
        .headers_mut()
        .insert(DATA_SOURCE_HEADER, HeaderValue::from_static(resolved.source.as_str()));
    Ok(response)
}

async fn image(State(state): State<Arc<AppState>>, Path(hash): Path<String>) -> Result<Response, ApiError> {
    if !is_valid_hash(&hash) {
        return Err(Error::InvalidHash.into());
    }
    let asset = state
        .store
        .get_image(&hash)
        .await?
        .ok_or_else(|| Error::NotFound(format!("image {hash}")))?;

    let content_type = HeaderValue::from_str(&asset.content_type)
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));

    let mut response = (StatusCode::OK, asset.bytes).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(IMAGE_CACHE_CONTROL));
    Ok(response)
}

async fn not_found(uri: Uri) -> (StatusCode, Json<ErrorBody>) {
    (StatusCode::NOT_FOUND, Json(ErrorBody { error: format!("NOT_FOUND: {}", uri.path()), code: "NOT_FOUND" }))
}
