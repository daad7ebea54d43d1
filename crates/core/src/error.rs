//! Unified error types for comicvine-proxy.
//!
//! Every variant's display string starts with a stable code so log lines and
//! error bodies can be grepped without parsing.

use tokio_rusqlite::rusqlite;

/// Unified error types for the proxy pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., a malformed image URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The path does not name a supported resource type.
    #[error("UNRECOGNIZED_RESOURCE: {0}")]
    UnrecognizedResource(String),

    /// A directly addressed item (e.g. an image hash) does not exist.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// The backing store could not be reached or failed an operation.
    #[error("STORE_UNAVAILABLE: {0}")]
    StoreUnavailable(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_UNAVAILABLE: migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be decoded.
    #[error("STORE_CORRUPT: {0}")]
    StoreCorrupt(String),

    /// Invalid hash format.
    #[error("INVALID_HASH: expected 64 hex characters")]
    InvalidHash,

    /// Network failure, timeout or 5xx from the remote API.
    #[error("UPSTREAM_UNAVAILABLE: {message}")]
    UpstreamUnavailable { message: String, timeout: bool },

    /// The remote API answered with a client error.
    #[error("UPSTREAM_REJECTED: status {status}")]
    UpstreamRejected { status: u16, body: Vec<u8>, content_type: Option<String> },

    /// The remote API answered 2xx with a body that is not JSON.
    #[error("UPSTREAM_INVALID: {0}")]
    UpstreamInvalid(String),

    /// Snapshot import failed.
    #[error("IMPORT_FAILED: {0}")]
    Import(String),
}

impl Error {
    /// Stable machine-readable code, matching the display prefix.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::UnrecognizedResource(_) => "UNRECOGNIZED_RESOURCE",
            Error::NotFound(_) => "NOT_FOUND",
            Error::StoreUnavailable(_) | Error::MigrationFailed(_) => "STORE_UNAVAILABLE",
            Error::StoreCorrupt(_) => "STORE_CORRUPT",
            Error::InvalidHash => "INVALID_HASH",
            Error::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            Error::UpstreamRejected { .. } => "UPSTREAM_REJECTED",
            Error::UpstreamInvalid(_) => "UPSTREAM_INVALID",
            Error::Import(_) => "IMPORT_FAILED",
        }
    }

    /// Whether the external caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::StoreUnavailable(_) | Error::MigrationFailed(_) | Error::UpstreamUnavailable { .. }
        )
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::StoreUnavailable(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::StoreUnavailable(tokio_rusqlite::Error::Close(c)),
            _ => Error::StoreUnavailable(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::StoreUnavailable(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::StoreUnavailable(tokio_rusqlite::Error::Error(err))
    }
}
