//! Error types and handling
//!
//! Every server-side failure is rendered as a ProblemDetails body. The
//! `instance` member is filled in by `middleware::problem` once the request
//! path is known.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::models::{ProblemDetails, QueryValidationError};

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unauthorized - authentication required (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Audit store error (500)
    #[error("Database error: {0}")]
    Database(String),

    /// Service unavailable (503)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        AppError::ServiceUnavailable(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// The specific reason, without the variant prefix.
    pub fn detail(&self) -> &str {
        match self {
            AppError::NotFound(m)
            | AppError::BadRequest(m)
            | AppError::Unauthorized(m)
            | AppError::Internal(m)
            | AppError::Database(m)
            | AppError::ServiceUnavailable(m) => m,
        }
    }

    pub fn to_problem(&self) -> ProblemDetails {
        ProblemDetails::new(self.status().as_u16(), self.detail())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "Request error");
        }

        let problem = self.to_problem();
        let mut response = (status, Json(problem.clone())).into_response();
        // Picked up by the instance-stamping middleware
        response.extensions_mut().insert(problem);
        response
    }
}

impl From<QueryValidationError> for AppError {
    fn from(err: QueryValidationError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Failures whose message says something was not found are 404, the rest 500.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let message = format!("{:#}", err);
        if message.to_lowercase().contains("not found") {
            AppError::NotFound(message)
        } else {
            AppError::Internal(message)
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            _ => AppError::Database(err.to_string()),
        }
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
