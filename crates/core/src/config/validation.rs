//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::net::SocketAddr;

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_image_bytes` is 0 or exceeds 50MB
    /// - `user_agent` is empty
    /// - `listen_addr` is not a socket address
    /// - `upstream_base_url` is not an http(s) URL
    /// - `image_hosts` contains an empty entry
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.max_image_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_image_bytes".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.max_image_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid {
                field: "max_image_bytes".into(),
                reason: "must not exceed 50MB".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid {
                field: "listen_addr".into(),
                reason: format!("'{}' is not a socket address", self.listen_addr),
            });
        }

        match url::Url::parse(&self.upstream_base_url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => {}
            _ => {
                return Err(ConfigError::Invalid {
                    field: "upstream_base_url".into(),
                    reason: "must be an http(s) URL".into(),
                });
            }
        }

        if self.image_hosts.iter().any(|h| h.trim().is_empty()) {
            return Err(ConfigError::Invalid { field: "image_hosts".into(), reason: "must not contain empty hosts".into() });
        }

        Ok(())
    }
}
