//! Error type shared by every handler.
//!
//! All variants render as `{"error": "<message>"}`. Authentication failures
//! share one message per kind so callers cannot tell which check failed.

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("email already registered")]
    Conflict,
    #[error("invalid or expired token")]
    Unauthorized,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("admin access required")]
    Forbidden,
    #[error("{0}")]
    NotFound(&'static str),
    #[error("rate limit exceeded")]
    RateLimited {
        max_requests: u32,
        window_seconds: u64,
    },
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Unauthorized | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn missing_payload() -> Self {
        Self::Validation("Missing payload".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::RateLimited {
                max_requests,
                window_seconds,
            } => {
                let body = Json(json!({
                    "error": "rate limit exceeded",
                    "message": format!("maximum {max_requests} requests per {window_seconds} seconds"),
                }));
                let mut response = (status, body).into_response();
                response
                    .headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from(window_seconds));
                response
            }
            Self::Internal(err) => {
                error!("Request failed: {err:#}");
                (status, Json(json!({ "error": "internal server error" }))).into_response()
            }
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}
