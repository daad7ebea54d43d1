//! comicvine-proxy server entry point.
//!
//! Loads configuration, opens the store, runs the optional snapshot import
//! and then serves HTTP. Logs go to stderr as JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use cvproxy_client::{ComicVineClient, ComicVineConfig, Upstream};
use cvproxy_core::{AppConfig, Store};
use tracing_subscriber::EnvFilter;

mod annotate;
mod error;
mod pipeline;
mod routes;
#[cfg(test)]
mod testutil;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("loading configuration")?;

    let default_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting comicvine-proxy");

    if config.api_key().is_none() {
        tracing::warn!("no ComicVine API key configured; upstream requests must carry api_key themselves");
    }

    let store = Store::open(&config.db_path)
        .await
        .with_context(|| format!("opening store at {}", config.db_path.display()))?;
    tracing::info!(path = %config.db_path.display(), "store opened");

    if let Some(snapshot) = &config.import_snapshot {
        run_import(&store, snapshot).await;
    }

    let upstream: Arc<dyn Upstream> = Arc::new(ComicVineClient::new(ComicVineConfig::from(&config))?);
    let state = Arc::new(routes::AppState::new(store, upstream, &config));
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Import failures are logged; the server keeps whatever committed and
/// starts anyway.
async fn run_import(store: &Store, snapshot: &std::path::Path) {
    match store.import_snapshot(snapshot).await {
        Ok(summary) if summary.is_complete() => {
            tracing::info!(
                snapshot = %snapshot.display(),
                tables = summary.tables.len(),
                rows = summary.total_rows(),
                skipped = summary.skipped.len(),
                "snapshot imported"
            );
        }
        Ok(summary) => {
            tracing::error!(
                snapshot = %snapshot.display(),
                tables = summary.tables.len(),
                rows = summary.total_rows(),
                failure = ?summary.failure,
                "snapshot import stopped early"
            );
        }
        Err(e) => tracing::error!(snapshot = %snapshot.display(), error = %e, "snapshot import failed"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
