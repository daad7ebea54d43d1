//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (CVPROXY_*)
//! 2. `COMICVINE_API_KEY` for the upstream key
//! 3. TOML config file (if CVPROXY_CONFIG_FILE set)
//! 4. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (CVPROXY_*)
/// 2. `COMICVINE_API_KEY`
/// 3. TOML config file (if CVPROXY_CONFIG_FILE set)
/// 4. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server-side ComicVine API key, used only when a client omits its own.
    ///
    /// Set via CVPROXY_API_KEY or COMICVINE_API_KEY.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Path to the SQLite store (cache, images and imported tables).
    ///
    /// Set via CVPROXY_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Address the HTTP listener binds to.
    ///
    /// Set via CVPROXY_LISTEN_ADDR environment variable.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Base URL of the upstream API.
    #[serde(default = "default_upstream_base_url")]
    pub upstream_base_url: String,

    /// Hosts whose image URLs are cached and rewritten.
    ///
    /// Set via CVPROXY_IMAGE_HOSTS environment variable, either comma-separated
    /// (`a.com,b.com`) or as an array (`[a.com, b.com]`).
    #[serde(default = "default_image_hosts", deserialize_with = "host_list")]
    pub image_hosts: Vec<String>,

    /// Prefix for rewritten image references (`{image_base_url}/images/{hash}`).
    ///
    /// Empty keeps references relative to the proxy.
    #[serde(default)]
    pub image_base_url: String,

    /// User-Agent string for upstream requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upstream request timeout in milliseconds.
    ///
    /// Set via CVPROXY_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes accepted for a single image.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,

    /// Snapshot imported once at startup, before traffic is served.
    ///
    /// Set via CVPROXY_IMPORT_SNAPSHOT environment variable.
    #[serde(default)]
    pub import_snapshot: Option<PathBuf>,

    /// Log at debug level when RUST_LOG is not set.
    #[serde(default)]
    pub verbose: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./comicvine-proxy.sqlite")
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".into()
}

fn default_upstream_base_url() -> String {
    "https://comicvine.gamespot.com".into()
}

fn default_image_hosts() -> Vec<String> {
    vec!["comicvine.gamespot.com".into()]
}

/// Accept a list of hosts or a single comma-separated string.
fn host_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Hosts {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match Hosts::deserialize(deserializer)? {
        Hosts::List(hosts) => hosts,
        Hosts::Csv(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .map(str::to_string)
            .collect(),
    })
}

fn default_user_agent() -> String {
    "comicvine-proxy/0.1".into()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_image_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            db_path: default_db_path(),
            listen_addr: default_listen_addr(),
            upstream_base_url: default_upstream_base_url(),
            image_hosts: default_image_hosts(),
            image_base_url: String::new(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_image_bytes: default_max_image_bytes(),
            import_snapshot: None,
            verbose: false,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The configured API key, if any non-empty one is set.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment()
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("CVPROXY_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment
            .merge(Env::raw().only(&["COMICVINE_API_KEY"]).map(|_| "api_key".into()))
            .merge(
                Env::prefixed("CVPROXY_")
                    .ignore(&["CONFIG_FILE"])
                    .map(|key| key.as_str().to_lowercase().into())
                    .split("__"),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./comicvine-proxy.sqlite"));
        assert_eq!(config.listen_addr, "127.0.0.1:8080");
        assert_eq!(config.upstream_base_url, "https://comicvine.gamespot.com");
        assert_eq!(config.image_hosts, vec!["comicvine.gamespot.com".to_string()]);
        assert_eq!(config.timeout_ms, 30_000);
        assert!(config.api_key.is_none());
        assert!(config.import_snapshot.is_none());
        assert!(!config.verbose);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(30_000));
    }

    #[test]
    fn test_empty_api_key_is_none() {
        let config = AppConfig { api_key: Some(String::new()), ..Default::default() };
        assert_eq!(config.api_key(), None);
    }

    #[test]
    fn test_load_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("CVPROXY_DB_PATH", "/tmp/cv.sqlite");
            jail.set_env("CVPROXY_TIMEOUT_MS", "5000");
            jail.set_env("CVPROXY_VERBOSE", "true");
            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.db_path, PathBuf::from("/tmp/cv.sqlite"));
            assert_eq!(config.timeout_ms, 5000);
            assert!(config.verbose);
            Ok(())
        });
    }

    #[test]
    fn test_comicvine_api_key_env() {
        Jail::expect_with(|jail| {
            jail.set_env("COMICVINE_API_KEY", "legacy-key");
            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.api_key(), Some("legacy-key"));
            Ok(())
        });
    }

    #[test]
    fn test_prefixed_key_wins_over_legacy() {
        Jail::expect_with(|jail| {
            jail.set_env("COMICVINE_API_KEY", "legacy-key");
            jail.set_env("CVPROXY_API_KEY", "new-key");
            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.api_key(), Some("new-key"));
            Ok(())
        });
    }

    #[test]
    fn test_image_hosts_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("CVPROXY_IMAGE_HOSTS", "comicvine.gamespot.com, static.comicvine.com");
            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.image_hosts, vec!["comicvine.gamespot.com", "static.comicvine.com"]);

            jail.set_env("CVPROXY_IMAGE_HOSTS", "[comicvine.gamespot.com, static.comicvine.com]");
            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.image_hosts.len(), 2);

            jail.set_env("CVPROXY_IMAGE_HOSTS", "static.comicvine.com");
            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.image_hosts, vec!["static.comicvine.com"]);
            Ok(())
        });
    }

    #[test]
    fn test_load_from_toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "proxy.toml",
                r#"
                listen_addr = "0.0.0.0:9000"
                image_hosts = ["comicvine.gamespot.com", "static.comicvine.com"]
                "#,
            )?;
            jail.set_env("CVPROXY_CONFIG_FILE", "proxy.toml");
            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.listen_addr, "0.0.0.0:9000");
            assert_eq!(config.image_hosts.len(), 2);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        Jail::expect_with(|jail| {
            jail.set_env("CVPROXY_TIMEOUT_MS", "10");
            assert!(AppConfig::load().is_err());
            Ok(())
        });
    }
}
