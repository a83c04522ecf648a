//! # AppError
//!
//! Centralized error handling for the snipsocial core.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

/// The primary error type for every service operation.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing/empty identifiers, self-reference, malformed input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Resource not found (user, snippet, comment, friendship edge, tag),
    /// or present but not in the state the operation expects.
    #[error("{0} not found: {1}")]
    NotFound(String, String),

    /// Resource already exists (e.g., a friendship edge for the pair)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Mutation attempted by someone other than the owner
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Infrastructure failure. The message is for logs only.
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(what: &str, key: impl std::fmt::Display) -> Self {
        AppError::NotFound(what.to_string(), key.to_string())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        AppError::InvalidArgument(msg.into())
    }

    /// Short machine-readable kind, used in API bodies and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidArgument(_) => "invalid_argument",
            AppError::NotFound(..) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Forbidden(_) => "forbidden",
            AppError::Internal(_) => "internal",
        }
    }
}

/// A specialized Result type for service logic.
pub type Result<T> = std::result::Result<T, AppError>;

/// Failure reported by a storage port.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write (concurrent duplicate).
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(what) => AppError::Conflict(what),
            StoreError::Backend(e) => AppError::Internal(format!("{e:#}")),
        }
    }
}

/// Bearer token verification failures.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    Missing,

    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_becomes_conflict() {
        let err: AppError = StoreError::UniqueViolation("friendship pair".into()).into();
        assert!(matches!(err, AppError::Conflict(ref what) if what == "friendship pair"));
    }

    #[test]
    fn backend_failure_becomes_internal() {
        let err: AppError = StoreError::Backend(anyhow::anyhow!("pool timed out")).into();
        assert_eq!(err.kind(), "internal");
        assert!(err.to_string().contains("pool timed out"));
    }

    #[test]
    fn not_found_formats_subject_and_key() {
        let err = AppError::not_found("comment", 42);
        assert_eq!(err.to_string(), "comment not found: 42");
    }
}
