//! crates/club_schedule_core/src/error.rs
//!
//! The business-rule error taxonomy surfaced by every scheduling operation.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::absence::AbsenceStatus;
use crate::ports::PortError;

/// Every failure a scheduling operation can report to its caller.
///
/// None of these are transient: they are user-facing rule rejections and are
/// never retried.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cannot {action} an absence that is {status}")]
    InvalidState {
        status: AbsenceStatus,
        action: &'static str,
    },

    #[error("The makeup deadline ({deadline}) has passed")]
    DeadlineExpired { deadline: NaiveDate },

    #[error("Class {slot_id} has no available spots on {date}")]
    CapacityExceeded { slot_id: Uuid, date: NaiveDate },

    #[error("The monthly limit of {limit} makeup classes has been reached")]
    MonthlyCapExceeded { limit: u32 },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// An unexpected failure from a storage port.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// A convenience type alias for `Result<T, ScheduleError>`.
pub type ScheduleResult<T> = Result<T, ScheduleError>;

impl From<PortError> for ScheduleError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => ScheduleError::NotFound(what),
            PortError::Conflict(what) => ScheduleError::Validation(what),
            PortError::Unauthorized => {
                ScheduleError::NotAuthorized("storage refused the request".to_string())
            }
            PortError::Unexpected(msg) => ScheduleError::Storage(msg),
        }
    }
}

impl ScheduleError {
    /// A stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            ScheduleError::NotAuthorized(_) => "not_authorized",
            ScheduleError::NotFound(_) => "not_found",
            ScheduleError::InvalidState { .. } => "invalid_state",
            ScheduleError::DeadlineExpired { .. } => "deadline_expired",
            ScheduleError::CapacityExceeded { .. } => "capacity_exceeded",
            ScheduleError::MonthlyCapExceeded { .. } => "monthly_cap_exceeded",
            ScheduleError::Validation(_) => "validation_error",
            ScheduleError::Storage(_) => "storage_error",
        }
    }
}
