//! Error types for the back office.

use crate::domain::{PaymentId, PaymentStatus};

/// Domain-level errors (business rule violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Payment is {0} and can no longer be changed")]
    ImmutableState(PaymentStatus),

    #[error("Payment {0} has already been processed")]
    AlreadyProcessed(PaymentId),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Payment {0} is paid and cannot be deleted")]
    CannotDeletePaid(PaymentId),

    #[error("Payment not found: {0}")]
    PaymentNotFound(PaymentId),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Application-level errors (for HTTP responses).
///
/// Lifecycle violations stay wrapped as [`DomainError`] so callers can tell
/// them apart; the HTTP adapter maps each to a status code.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(e) => AppError::Domain(e),
            RepoError::NotFound => AppError::NotFound("Resource not found".into()),
            RepoError::Database(e) => AppError::Internal(e),
            RepoError::Transaction(e) => AppError::Internal(e),
            RepoError::Conflict(e) => AppError::Conflict(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_errors_keep_domain_detail() {
        let id = PaymentId::new();
        let err: AppError = RepoError::Domain(DomainError::AlreadyProcessed(id)).into();
        assert!(matches!(
            err,
            AppError::Domain(DomainError::AlreadyProcessed(got)) if got == id
        ));
    }

    #[test]
    fn test_database_errors_become_internal() {
        let err: AppError = RepoError::Database("disk full".into()).into();
        assert!(matches!(err, AppError::Internal(msg) if msg == "disk full"));
    }
}
