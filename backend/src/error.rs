//! Service errors and their HTTP mapping.

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{FieldViolation, TaskId, ValidationErrors};
use thiserror::Error;

use crate::store::StoreError;

pub type TaskResult<T> = Result<T, TaskError>;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error(transparent)]
    Persistence(StoreError),
}

impl From<StoreError> for TaskError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Persistence(other),
        }
    }
}

impl From<JsonRejection> for TaskError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(ValidationErrors::single("body", rejection.body_text()))
    }
}

impl From<PathRejection> for TaskError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "rejected task id");
        Self::invalid_id()
    }
}

impl TaskError {
    pub fn invalid_id() -> Self {
        Self::Validation(ValidationErrors::single(
            "id",
            "id must be a positive integer",
        ))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON body returned for every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<FieldViolation>,
}

impl IntoResponse for TaskError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (message, violations) = match self {
            Self::Validation(errors) => ("validation failed".to_string(), errors.0),
            Self::NotFound(id) => (format!("task not found: {id}"), Vec::new()),
            Self::Persistence(err) => {
                tracing::error!(error = %err, "task store failure");
                ("internal server error".to_string(), Vec::new())
            }
        };

        let body = ErrorBody {
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message,
            violations,
        };

        (status, Json(body)).into_response()
    }
}
