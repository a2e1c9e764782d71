//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use club_schedule_core::{PortError, ScheduleError};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A business-rule rejection from the scheduling core.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The request carried no usable caller identity.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Malformed request input caught before it reaches the core.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// The JSON body returned for every failed request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Stable machine-readable code, e.g. `deadline_expired`.
    pub error: String,
    pub message: String,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Schedule(err) => {
                let status = match err {
                    ScheduleError::NotAuthorized(_) => StatusCode::FORBIDDEN,
                    ScheduleError::NotFound(_) => StatusCode::NOT_FOUND,
                    ScheduleError::InvalidState { .. } => StatusCode::CONFLICT,
                    ScheduleError::DeadlineExpired { .. } => StatusCode::GONE,
                    ScheduleError::CapacityExceeded { .. } => StatusCode::CONFLICT,
                    ScheduleError::MonthlyCapExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    ScheduleError::Validation(_) => StatusCode::BAD_REQUEST,
                    ScheduleError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.code())
            }
            ApiError::Port(PortError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Port(PortError::Conflict(_)) => (StatusCode::BAD_REQUEST, "validation_error"),
            ApiError::Port(PortError::Unauthorized) => (StatusCode::FORBIDDEN, "not_authorized"),
            ApiError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "not_authorized"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = if status.is_server_error() {
            error!("Request failed: {:?}", self);
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            error: code.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
