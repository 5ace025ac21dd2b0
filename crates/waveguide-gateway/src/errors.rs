//! Waveguide gateway error types.
//!
//! Every rejection the gateway produces is rendered as the same JSON shape:
//!
//! ```json
//! {"status": 401, "message": "Unauthorized access", "timestamp": "...", "path": "/api/v1/auth/me"}
//! ```
//!
//! Token failures are deliberately indistinguishable on the wire. The
//! specific [`TokenError`] variant is logged at debug level only.

use crate::directory::DirectoryError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Message returned for every authentication failure.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized access";

/// Message returned when a client exhausts its quota.
pub const RATE_LIMITED_MESSAGE: &str = "Rate limit exceeded. Try again later.";

/// Identity token failures.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature does not match")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("token declares an unsupported signing algorithm")]
    UnsupportedAlgorithm,

    #[error("token has been revoked")]
    Revoked,
}

impl TokenError {
    /// Bounded label for metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::BadSignature => "bad_signature",
            TokenError::Expired => "expired",
            TokenError::UnsupportedAlgorithm => "unsupported_algorithm",
            TokenError::Revoked => "revoked",
        }
    }
}

/// Rate limiter rejections.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("request quota exceeded, retry after {}s", .retry_after.as_secs())]
    QuotaExceeded {
        /// Time until the client's bucket holds one whole unit again.
        retry_after: Duration,
    },
}

/// HTTP-facing error type.
///
/// Maps to:
/// - Unauthorized, MissingBearerToken, UnknownSubject, InvalidCredentials: 401
/// - RateLimited: 429
/// - Conflict: 409
/// - BadRequest: 400
/// - Internal: 500
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid token: {0}")]
    Unauthorized(#[from] TokenError),

    #[error("Missing or malformed Authorization header")]
    MissingBearerToken,

    #[error("Verified subject has no directory entry")]
    UnknownSubject,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Rate limit exceeded: {0}")]
    RateLimited(#[from] RateLimitError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_)
            | ApiError::MissingBearerToken
            | ApiError::UnknownSubject
            | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-visible message. Never contains internal detail.
    fn client_message(&self) -> String {
        match self {
            ApiError::Unauthorized(_) | ApiError::MissingBearerToken | ApiError::UnknownSubject => {
                UNAUTHORIZED_MESSAGE.to_string()
            }
            ApiError::InvalidCredentials => "Invalid email or password".to_string(),
            ApiError::RateLimited(_) => RATE_LIMITED_MESSAGE.to_string(),
            ApiError::Conflict(reason) | ApiError::BadRequest(reason) => reason.clone(),
            ApiError::Internal => "An unexpected error occurred".to_string(),
        }
    }

    /// Attach the request path the error is reported against.
    pub fn at(self, path: impl Into<String>) -> ApiRejection {
        ApiRejection {
            error: self,
            path: path.into(),
            details: Vec::new(),
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::UsernameTaken => {
                ApiError::Conflict("Username is already taken".to_string())
            }
            DirectoryError::EmailTaken => {
                ApiError::Conflict("Email is already registered".to_string())
            }
            DirectoryError::Unavailable(reason) => {
                tracing::error!(target: "waveguide.errors", reason = %reason, "User directory unavailable");
                ApiError::Internal
            }
        }
    }
}

/// Error body shared by every rejection.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

/// An [`ApiError`] bound to the request path, ready to render.
#[derive(Debug)]
pub struct ApiRejection {
    pub error: ApiError,
    pub path: String,
    pub details: Vec<String>,
}

impl ApiRejection {
    /// Add a detail line to the response body.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }
}

impl IntoResponse for ApiRejection {
    fn into_response(self) -> Response {
        let status = self.error.status_code();

        match &self.error {
            ApiError::Internal => {
                tracing::error!(target: "waveguide.errors", path = %self.path, "Internal error while handling request");
            }
            ApiError::Unauthorized(reason) => {
                tracing::debug!(target: "waveguide.errors", path = %self.path, reason = %reason, "Rejecting unauthenticated request");
            }
            _ => {}
        }

        let body = ErrorResponse {
            status: status.as_u16(),
            message: self.error.client_message(),
            timestamp: Utc::now(),
            path: self.path,
            details: self.details,
        };

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"waveguide-api\", error=\"invalid_token\""),
            );
        }

        if let ApiError::RateLimited(RateLimitError::QuotaExceeded { retry_after }) = &self.error {
            // Round up so clients never retry before a unit is available
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::Unauthorized(TokenError::Expired).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::MissingBearerToken.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::UnknownSubject.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::RateLimited(RateLimitError::QuotaExceeded {
                retry_after: Duration::from_secs(1)
            })
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::Conflict("taken".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::BadRequest("bad".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Internal.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_token_error_labels_are_distinct() {
        let labels = [
            TokenError::Malformed.as_label(),
            TokenError::BadSignature.as_label(),
            TokenError::Expired.as_label(),
            TokenError::UnsupportedAlgorithm.as_label(),
            TokenError::Revoked.as_label(),
        ];
        let unique: std::collections::HashSet<_> = labels.iter().collect();
        assert_eq!(unique.len(), labels.len());
    }

    #[tokio::test]
    async fn test_every_token_error_renders_identically() {
        let variants = [
            TokenError::Malformed,
            TokenError::BadSignature,
            TokenError::Expired,
            TokenError::UnsupportedAlgorithm,
            TokenError::Revoked,
        ];

        for variant in variants {
            let response = ApiError::from(variant).at("/api/v1/auth/me").into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

            let www_auth = response
                .headers()
                .get(header::WWW_AUTHENTICATE)
                .unwrap()
                .to_str()
                .unwrap()
                .to_string();
            assert!(www_auth.contains("Bearer realm=\"waveguide-api\""));

            let body = read_body_json(response.into_body()).await;
            assert_eq!(body["status"], 401);
            assert_eq!(body["message"], "Unauthorized access");
            assert_eq!(body["path"], "/api/v1/auth/me");
            assert!(body["timestamp"].is_string());
            assert!(body.get("details").is_none());
        }
    }

    #[tokio::test]
    async fn test_rate_limited_response() {
        let error = ApiError::RateLimited(RateLimitError::QuotaExceeded {
            retry_after: Duration::from_millis(35_200),
        });
        let response = error.at("/api/v1/waveguides").into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "36");
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["status"], 429);
        assert_eq!(body["message"], "Rate limit exceeded. Try again later.");
        assert_eq!(body["path"], "/api/v1/waveguides");
    }

    #[test]
    fn test_directory_errors_map_to_conflict_or_internal() {
        assert!(matches!(
            ApiError::from(DirectoryError::UsernameTaken),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(DirectoryError::EmailTaken),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(DirectoryError::Unavailable("down".to_string())),
            ApiError::Internal
        ));
    }

    #[tokio::test]
    async fn test_internal_error_is_generic() {
        let response = ApiError::Internal.at("/api/v1/auth/login").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["message"], "An unexpected error occurred");
    }

    #[tokio::test]
    async fn test_details_are_serialized_when_present() {
        let response = ApiError::BadRequest("Validation error".to_string())
            .at("/api/v1/auth/register")
            .with_detail("email: must be a well-formed email address")
            .into_response();

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["status"], 400);
        assert_eq!(
            body["details"][0],
            "email: must be a well-formed email address"
        );
    }
}
