//! Error taxonomy for report lifecycle operations.
//!
//! Four outcomes are visible to callers of the lifecycle manager:
//!
//! | Variant | Meaning | Caller action |
//! |---|---|---|
//! | [`ReportError::Validation`] | missing or malformed field | fix the request |
//! | [`ReportError::NotFound`] | no report with that id | none |
//! | [`ReportError::Forbidden`] | visibility filter denied access | none |
//! | [`ReportError::InvalidTransition`] | rejected by the transition policy | none |
//! | [`ReportError::Storage`] | persistence failure, no retry inside the core | retry later |
//!
//! Event emission failures are deliberately absent: they are logged and
//! swallowed by the lifecycle manager and never returned from `create` or
//! `update_status`.

use crate::identifier::ReportId;
use crate::report::ReportStatus;
use crate::repository::RepositoryError;
use thiserror::Error;

/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, ReportError>;

/// Errors returned by the report lifecycle manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    /// A required field is missing, blank or malformed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No report exists with the given identifier.
    #[error("Report not found: {0}")]
    NotFound(ReportId),

    /// The viewer may not see the requested report.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// The configured transition policy rejected a status change.
    #[error("Status transition from {from} to {to} is not allowed")]
    InvalidTransition {
        /// Status the report currently has.
        from: ReportStatus,
        /// Status that was requested.
        to: ReportStatus,
    },

    /// The persistence collaborator failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ReportError {
    /// Convenience constructor for validation failures.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<RepositoryError> for ReportError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => Self::NotFound(id),
            other => Self::Storage(other.to_string()),
        }
    }
}
