use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    /// Referenced schedule does not resolve to a row the operation may touch
    NotFound(String),
    /// Out-of-range position, missing required field, malformed input
    InvalidArgument(String),
    /// Concurrent modification detected while applying a shift batch
    Conflict(String),
    /// Any lower-level I/O failure during read or atomic write
    StorageFailure(String),
    Configuration(String),
    Internal(String),
}

// SQLite busy/locked (plain and extended) and PostgreSQL serialization/deadlock codes.
const CONFLICT_CODES: &[&str] = &["5", "6", "261", "262", "517", "40001", "40P01"];

impl AppError {
    /// Classify a sqlx failure, keeping the caller's context in the message.
    pub fn from_sqlx(context: &str, err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound(context.to_string()),
            sqlx::Error::Database(db_err) => {
                let is_conflict = db_err
                    .code()
                    .map(|code| CONFLICT_CODES.contains(&code.as_ref()))
                    .unwrap_or(false);
                if is_conflict {
                    AppError::Conflict(format!("{}: {}", context, err))
                } else {
                    AppError::StorageFailure(format!("{}: {}", context, err))
                }
            }
            _ => AppError::StorageFailure(format!("{}: {}", context, err)),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::StorageFailure(msg) => write!(f, "Storage failure: {}", msg),
            AppError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::StorageFailure(msg) => {
                tracing::error!("Storage failure: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::from_sqlx("Database error", err)
    }
}

pub type AppResult<T> = Result<T, AppError>;
