//! HTTP mapping for pipeline errors.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use cvproxy_core::Error;
use serde::Serialize;

/// Error body for everything except passthrough rejections.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

/// Handler error wrapping the core taxonomy.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::InvalidInput(_) | Error::InvalidHash => StatusCode::BAD_REQUEST,
            Error::UnrecognizedResource(_) | Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::StoreUnavailable(_) | Error::MigrationFailed(_) | Error::StoreCorrupt(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Error::UpstreamUnavailable { timeout: true, .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::UpstreamUnavailable { timeout: false, .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::UpstreamRejected { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Error::UpstreamInvalid(_) => StatusCode::BAD_GATEWAY,
            Error::Import(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self.0, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self.0, status = status.as_u16(), "request rejected");
        }

        match self.0 {
            Error::UpstreamRejected { body, content_type, .. } => {
                let mut response = (status, body).into_response();
                let value = content_type
                    .and_then(|ct| HeaderValue::from_str(&ct).ok())
                    .unwrap_or(HeaderValue::from_static("application/json"));
                response.headers_mut().insert(header::CONTENT_TYPE, value);
                response
            }
            err => {
                let body = ErrorBody { error: err.to_string(), code: err.code() };
                (status, Json(body)).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::InvalidInput("x".into()), 400),
            (Error::InvalidHash, 400),
            (Error::UnrecognizedResource("/api/x".into()), 404),
            (Error::NotFound("x".into()), 404),
            (Error::MigrationFailed("x".into()), 503),
            (Error::StoreCorrupt("x".into()), 503),
            (Error::UpstreamUnavailable { message: "x".into(), timeout: false }, 503),
            (Error::UpstreamUnavailable { message: "x".into(), timeout: true }, 504),
            (Error::UpstreamInvalid("x".into()), 502),
            (Error::Import("x".into()), 500),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status().as_u16(), expected);
        }
    }

    #[tokio::test]
    async fn test_json_error_body() {
        let response = ApiError(Error::UnrecognizedResource("/api/comics".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body: serde_json::Value = serde_json::from_slice(&body_of(response).await).unwrap();
        assert_eq!(body["code"], "UNRECOGNIZED_RESOURCE");
        assert!(body["error"].as_str().unwrap().contains("/api/comics"));
    }

    #[tokio::test]
    async fn test_rejection_passthrough() {
        let err = Error::UpstreamRejected {
            status: 401,
            body: b"Invalid API Key".to_vec(),
            content_type: Some("text/plain".into()),
        };
        let response = ApiError(err).into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(body_of(response).await, b"Invalid API Key");
    }
}
