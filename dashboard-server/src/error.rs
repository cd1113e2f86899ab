//! `AppError`: the HTTP-facing error type. `CoreError` never crosses the
//! axum boundary directly — every handler maps it here so the status
//! code policy (spec.md §7) lives in one place.
//!
//! Grounded on `ferrex-server/src/errors.rs`'s `AppError` shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": {
                    "message": self.message,
                    "status": self.status.as_u16(),
                }
            })),
        )
            .into_response()
    }
}

/// Maps onto the status-code policy in spec.md §7. `Unavailable`/`Fatal`
/// never leak internals to the client; the detail goes to `tracing::error!`.
impl From<dashboard_core::CoreError> for AppError {
    fn from(err: dashboard_core::CoreError) -> Self {
        use dashboard_core::CoreError;
        match err {
            CoreError::Unavailable(detail) => {
                error!(%detail, "database unavailable");
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "service temporarily unavailable")
            }
            CoreError::MissingSession => Self::new(StatusCode::UNAUTHORIZED, err.to_string()),
            CoreError::SessionInvalid => Self::new(StatusCode::UNAUTHORIZED, err.to_string()),
            CoreError::RegistrationConflict(hostname) => {
                Self::new(StatusCode::CONFLICT, format!("worker '{hostname}' already has a live session"))
            }
            CoreError::NotFound(what) => Self::new(StatusCode::NOT_FOUND, what),
            CoreError::Busy => Self::new(StatusCode::CONFLICT, err.to_string()),
            CoreError::InvalidInput(detail) => Self::bad_request(detail),
            CoreError::ExternalProvider(detail) => {
                error!(%detail, "external provider error");
                Self::new(StatusCode::BAD_GATEWAY, "external provider error")
            }
            CoreError::Fatal(detail) => {
                error!(%detail, "fatal error surfaced at request boundary");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }
}
