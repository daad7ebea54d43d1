//! Content-addressed image keys and URL canonicalization.

use sha2::{Digest, Sha256};

use crate::Error;

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<UrlError> for Error {
    fn from(err: UrlError) -> Self {
        Error::InvalidInput(err.to_string())
    }
}

/// Canonicalize an image URL so equivalent spellings share one key.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize_url(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if parsed.host_str().is_none() {
        return Err(UrlError::InvalidUrl("missing host".into()));
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// SHA-256 of the canonical URL, hex encoded.
pub fn image_key(source_url: &str) -> Result<String, Error> {
    let canonical = canonicalize_url(source_url)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_str().as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Whether `hash` has the shape of an image key (64 lowercase hex digits).
pub fn is_valid_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
