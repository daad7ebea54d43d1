//! Classification of upstream responses into the shared error taxonomy.

use cvproxy_core::Error;
use reqwest::StatusCode;
use serde_json::Value;

/// Map a transport failure. Timeouts are distinguished so the HTTP layer can
/// answer 504 instead of 503.
pub fn network_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::UpstreamUnavailable { message: "request timed out".into(), timeout: true }
    } else {
        Error::UpstreamUnavailable { message: format!("network error: {err}"), timeout: false }
    }
}

/// Reject non-success statuses: 4xx is passed through, everything else
/// means the upstream is unavailable.
pub fn check_status(status: StatusCode, content_type: Option<&str>, body: &[u8]) -> Result<(), Error> {
    if status.is_success() {
        return Ok(());
    }
    if status.is_client_error() {
        return Err(Error::UpstreamRejected {
            status: status.as_u16(),
            body: body.to_vec(),
            content_type: content_type.map(str::to_string),
        });
    }
    Err(Error::UpstreamUnavailable { message: format!("status {}", status.as_u16()), timeout: false })
}

/// Decode a successful body as JSON.
pub fn parse_json(body: &[u8]) -> Result<Value, Error> {
    serde_json::from_slice(body).map_err(|e| Error::UpstreamInvalid(format!("response is not JSON: {e}")))
}
