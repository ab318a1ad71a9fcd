// libs/reschedule-cell/src/error.rs
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RescheduleError {
    #[error("Appointment conflicts with existing booking: {0}")]
    Conflict(String),

    #[error("Malformed slot address: {0}")]
    MalformedSlotAddress(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Reschedule timed out after {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },

    #[error("Persistence error: {0}")]
    PersistenceError(String),
}

impl RescheduleError {
    /// Default conflict predicate: only a booking collision counts
    pub fn is_conflict(&self) -> bool {
        matches!(self, RescheduleError::Conflict(_))
    }
}
