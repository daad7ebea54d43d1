//! Maintenance commands for a comicvine-proxy store.
//!
//! ```bash
//! cvproxy [--db <path>] import <snapshot>
//! cvproxy stats
//! cvproxy purge [--type <resource>]
//! cvproxy purge-images
//! ```
//!
//! Output is JSON on stdout; logs go to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cvproxy_core::{AppConfig, ResourceType, Store};
use serde_json::json;

#[derive(Parser, Debug)]
#[command(name = "cvproxy", version, about = "Manage the comicvine-proxy store")]
struct Cli {
    /// Store path; defaults to the configured `db_path`
    #[arg(long, global = true, value_name = "PATH", env = "CVPROXY_DB_PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Import cv_* tables from a snapshot database
    Import {
        #[arg(value_name = "SNAPSHOT")]
        snapshot: PathBuf,
    },
    /// Show cached entry, imported row and image counts
    Stats,
    /// Delete cached API responses
    Purge {
        /// Only purge this resource type (singular or plural name)
        #[arg(long = "type", value_name = "RESOURCE", value_parser = parse_resource_type)]
        resource_type: Option<ResourceType>,
    },
    /// Delete all stored images
    PurgeImages,
}

fn parse_resource_type(raw: &str) -> Result<ResourceType, String> {
    raw.parse().map_err(|_| format!("unknown resource type '{raw}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let db_path = match cli.db {
        Some(path) => path,
        None => AppConfig::load().context("loading configuration")?.db_path,
    };
    let store = Store::open(&db_path)
        .await
        .with_context(|| format!("opening store at {}", db_path.display()))?;

    let output = match cli.command {
        Command::Import { snapshot } => {
            let summary = store
                .import_snapshot(&snapshot)
                .await
                .with_context(|| format!("importing {}", snapshot.display()))?;
            let complete = summary.is_complete();
            print_json(&serde_json::to_value(&summary)?)?;
            if !complete {
                anyhow::bail!("import stopped early; see `failure`");
            }
            return Ok(());
        }
        Command::Stats => serde_json::to_value(store.cache_stats().await?)?,
        Command::Purge { resource_type } => {
            let deleted = store.purge_entries(resource_type).await?;
            json!({
                "deleted": deleted,
                "resource_type": resource_type.map(ResourceType::as_str),
            })
        }
        Command::PurgeImages => json!({ "deleted": store.purge_images().await? }),
    };

    print_json(&output)
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
