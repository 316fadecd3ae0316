use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Request-level error taxonomy.
///
/// Validation variants are produced before any store call; `Store` wraps
/// driver failures caught at the handler boundary and is reported to the
/// caller as a generic message, with detail only in the logs.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid {0} id.")]
    InvalidIdentifier(&'static str),
    #[error("{0}")]
    MissingField(&'static str),
    #[error("Not found.")]
    NotFound,
    #[error("Admin already exists.")]
    Conflict,
    #[error("Invalid username or password.")]
    Unauthorized,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidIdentifier(_) | Self::MissingField(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Store(err) => {
                tracing::error!(error = ?err, "request failed with a store error");
                "Internal server error.".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
