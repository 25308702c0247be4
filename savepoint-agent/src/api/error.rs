use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use savepoint_core::error::{BackupError, ConfigError};
use serde_json::json;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unprocessable(String),
}

impl From<BackupError> for ApiError {
    fn from(e: BackupError) -> Self {
        match e {
            BackupError::AlreadyRunning => ApiError::Conflict(e.to_string()),
            other => ApiError::Unprocessable(other.to_string()),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        ApiError::Unprocessable(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(m) => {
                tracing::warn!("Rejected request: {m}");
                StatusCode::UNPROCESSABLE_ENTITY
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
