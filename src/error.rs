//! Error types for osr-assessment

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssessmentError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid {field} ID: {value:?}")]
    InvalidIdentifier { field: &'static str, value: String },

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AssessmentError {
    /// True for errors caused by the caller's input rather than a server fault
    pub fn is_client_error(&self) -> bool {
        !matches!(self, AssessmentError::Internal(_))
    }
}

pub type Result<T> = std::result::Result<T, AssessmentError>;
