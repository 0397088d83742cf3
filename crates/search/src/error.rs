//! Error types for the search core.
//!
//! Every failure is returned to the immediate caller typed by kind. The
//! top-level [`CoreError`] nests category enums the same way across all
//! components, and [`CoreError::kind`] collapses them into the flat
//! [`ErrorKind`] taxonomy callers use to pick a retry policy.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// The primary error type for all core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed caller input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The bearer token is missing or has been revoked.
    ///
    /// Carries no detail so that a rejected caller learns nothing about the
    /// records it asked for.
    #[error("unauthorized")]
    Unauthorized,

    /// A shared dependency failed or timed out.
    #[error(transparent)]
    Dependency(#[from] DependencyError),

    /// The search backend rejected a document.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// The query translator cannot express the requested criteria.
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Errors caused by malformed caller input.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A tracking identifier was empty.
    #[error("tracking id must not be empty")]
    EmptyTrackingId,

    /// A chunk limit was zero or negative.
    #[error("chunk limit must be positive, got {limit}")]
    InvalidChunkLimit { limit: i64 },

    /// The record's `resourceType` is not one of the supported kinds.
    #[error("unsupported resource type: {resource_type}")]
    UnknownResourceType { resource_type: String },

    /// The record's `status` is not a recognized registration status.
    #[error("unknown registration status: {status}")]
    UnknownStatus { status: String },

    /// A required field is missing or has the wrong shape.
    #[error("invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    /// A date range whose lower bound is after its upper bound.
    #[error("invalid date range: {from} is after {to}")]
    InvalidDateRange { from: String, to: String },

    /// A search criterion carried an unusable value.
    #[error("invalid search criterion '{criterion}': {message}")]
    InvalidCriterion { criterion: String, message: String },

    /// Core configuration rejected at construction.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// A shared, externally owned service the core depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    /// The key-value token invalidation store.
    InvalidationStore,
    /// The search index backend.
    SearchBackend,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::InvalidationStore => write!(f, "invalidation store"),
            Dependency::SearchBackend => write!(f, "search backend"),
        }
    }
}

/// Transient failures of shared dependencies.
#[derive(Error, Debug)]
pub enum DependencyError {
    /// The dependency could not be reached or answered with a server error.
    #[error("{dependency} unavailable: {message}")]
    Unavailable {
        dependency: Dependency,
        message: String,
    },

    /// The dependency did not answer within the caller-supplied timeout.
    #[error("{dependency} timed out after {timeout_ms}ms")]
    Timeout {
        dependency: Dependency,
        timeout_ms: u64,
    },
}

/// Errors writing documents to the search index.
#[derive(Error, Debug)]
pub enum IndexError {
    /// The backend rejected the document for this record.
    #[error("index write failed for record {record_id}: {reason}")]
    WriteFailed { record_id: String, reason: String },
}

/// Errors translating search criteria.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The filter combination cannot be expressed as a backend query.
    #[error("unsupported query: {message}")]
    Unsupported { message: String },
}

/// Flat classification of [`CoreError`] used for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Malformed input; fix the call.
    InvalidArgument,
    /// Revoked or missing token; retry only with a fresh token.
    Unauthorized,
    /// Dependency unreachable; retry with backoff.
    DependencyUnavailable,
    /// Dependency timed out; retry with backoff.
    DependencyTimeout,
    /// Document rejected by the backend; retry individually.
    IndexWriteFailed,
    /// Criteria the translator cannot express; surfaced verbatim.
    UnsupportedQuery,
}

impl ErrorKind {
    /// Returns `true` if a caller may retry the same call unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::DependencyUnavailable
                | ErrorKind::DependencyTimeout
                | ErrorKind::IndexWriteFailed
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidArgument => write!(f, "invalid-argument"),
            ErrorKind::Unauthorized => write!(f, "unauthorized"),
            ErrorKind::DependencyUnavailable => write!(f, "dependency-unavailable"),
            ErrorKind::DependencyTimeout => write!(f, "dependency-timeout"),
            ErrorKind::IndexWriteFailed => write!(f, "index-write-failed"),
            ErrorKind::UnsupportedQuery => write!(f, "unsupported-query"),
        }
    }
}

impl CoreError {
    /// Returns the taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::InvalidArgument,
            CoreError::Unauthorized => ErrorKind::Unauthorized,
            CoreError::Dependency(DependencyError::Unavailable { .. }) => {
                ErrorKind::DependencyUnavailable
            }
            CoreError::Dependency(DependencyError::Timeout { .. }) => ErrorKind::DependencyTimeout,
            CoreError::Index(_) => ErrorKind::IndexWriteFailed,
            CoreError::Query(_) => ErrorKind::UnsupportedQuery,
        }
    }

    /// Shorthand for an unavailable dependency.
    pub fn unavailable(dependency: Dependency, message: impl Into<String>) -> Self {
        CoreError::Dependency(DependencyError::Unavailable {
            dependency,
            message: message.into(),
        })
    }

    /// Shorthand for a rejected document.
    pub fn write_failed(record_id: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::Index(IndexError::WriteFailed {
            record_id: record_id.into(),
            reason: reason.into(),
        })
    }

    /// Shorthand for an inexpressible query.
    pub fn unsupported_query(message: impl Into<String>) -> Self {
        CoreError::Query(QueryError::Unsupported {
            message: message.into(),
        })
    }
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Validation(ValidationError::InvalidField {
            field: "<document>".to_string(),
            message: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let err: CoreError = ValidationError::EmptyTrackingId.into();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = CoreError::unavailable(Dependency::InvalidationStore, "connection refused");
        assert_eq!(err.kind(), ErrorKind::DependencyUnavailable);

        let err: CoreError = DependencyError::Timeout {
            dependency: Dependency::SearchBackend,
            timeout_ms: 250,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::DependencyTimeout);

        assert_eq!(CoreError::Unauthorized.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            CoreError::write_failed("B7XK2Q1", "mapper_parsing_exception").kind(),
            ErrorKind::IndexWriteFailed
        );
        assert_eq!(
            CoreError::unsupported_query("text with identifier").kind(),
            ErrorKind::UnsupportedQuery
        );
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::DependencyUnavailable.is_retryable());
        assert!(ErrorKind::DependencyTimeout.is_retryable());
        assert!(ErrorKind::IndexWriteFailed.is_retryable());
        assert!(!ErrorKind::InvalidArgument.is_retryable());
        assert!(!ErrorKind::Unauthorized.is_retryable());
        assert!(!ErrorKind::UnsupportedQuery.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = CoreError::write_failed("B7XK2Q1", "rejected");
        assert_eq!(
            err.to_string(),
            "index write failed for record B7XK2Q1: rejected"
        );

        let err: CoreError = DependencyError::Timeout {
            dependency: Dependency::InvalidationStore,
            timeout_ms: 100,
        }
        .into();
        assert_eq!(err.to_string(), "invalidation store timed out after 100ms");

        assert_eq!(CoreError::Unauthorized.to_string(), "unauthorized");
    }

    #[test]
    fn test_chunk_limit_display() {
        let err = ValidationError::InvalidChunkLimit { limit: -1 };
        assert_eq!(err.to_string(), "chunk limit must be positive, got -1");
    }
}
