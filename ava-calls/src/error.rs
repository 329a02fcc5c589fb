//! Error types for ava-calls HTTP handlers

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Webhook signature missing or wrong (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// ava-common error
    #[error(transparent)]
    Common(#[from] ava_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use ava_common::Error as E;

        let mut retry_after = None;
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(err) => match err {
                E::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
                E::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
                E::UpstreamUnavailable(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg),
                E::ServiceUnavailable {
                    service,
                    retry_after_secs,
                } => {
                    retry_after = Some(retry_after_secs);
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "SERVICE_UNAVAILABLE",
                        format!("{service} temporarily unavailable"),
                    )
                }
                E::TenantUnresolved(msg) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "TENANT_UNRESOLVED", msg)
                }
                other => {
                    tracing::error!(error = %other, "Request failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        other.to_string(),
                    )
                }
            },
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::from(ava_common::Error::NotFound("x".into())), StatusCode::NOT_FOUND),
            (ApiError::from(ava_common::Error::InvalidInput("x".into())), StatusCode::BAD_REQUEST),
            (ApiError::from(ava_common::Error::UpstreamUnavailable("x".into())), StatusCode::BAD_GATEWAY),
            (ApiError::from(ava_common::Error::TenantUnresolved("x".into())), StatusCode::SERVICE_UNAVAILABLE),
            (ApiError::from(ava_common::Error::Internal("x".into())), StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::Unauthorized("sig".into()), StatusCode::UNAUTHORIZED),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_breaker_open_sets_retry_after() {
        let response = ApiError::from(ava_common::Error::ServiceUnavailable {
            service: "vapi".into(),
            retry_after_secs: 30,
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "30");
    }
}
