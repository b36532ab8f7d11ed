//! Mini App Gate error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse` impl.
//! Client-facing messages stay generic; the detailed reason is logged
//! server-side by the stage that produced it.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Mini App Gate error type.
///
/// Maps to HTTP status codes:
/// - InvalidInitData: 401 Unauthorized
/// - Forbidden: 403 Forbidden
/// - RateLimitExceeded: 429 Too Many Requests
/// - BadRequest: 400 Bad Request
/// - PayloadTooLarge: 413 Payload Too Large
/// - ProfileStore, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Invalid init data: {0}")]
    InvalidInitData(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Profile store error: {0}")]
    ProfileStore(String),

    #[error("Internal server error")]
    Internal,
}

impl GateError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            GateError::InvalidInitData(_) => 401,
            GateError::Forbidden(_) => 403,
            GateError::RateLimitExceeded => 429,
            GateError::BadRequest(_) => 400,
            GateError::PayloadTooLarge(_) => 413,
            GateError::ProfileStore(_) | GateError::Internal => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            GateError::InvalidInitData(reason) => (
                StatusCode::UNAUTHORIZED,
                "INVALID_INIT_DATA",
                reason.clone(),
            ),
            GateError::Forbidden(reason) => (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone()),
            GateError::RateLimitExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMIT_EXCEEDED",
                "Too many requests. Please try again later.".to_string(),
            ),
            GateError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            GateError::PayloadTooLarge(limit) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                format!("Request body exceeds {} bytes", limit),
            ),
            GateError::ProfileStore(err) => {
                tracing::error!(target: "gate.profiles", error = %err, "Profile store operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PROFILE_STORE_ERROR",
                    "An internal storage error occurred".to_string(),
                )
            }
            GateError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "TelegramInitData realm=\"miniapp-gate\"".parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
