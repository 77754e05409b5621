//! Application error types for crosslist
//!
//! This module defines common error types used throughout the application.
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Failure kinds reported by platform adapters and the dispatch layer
///
/// Every platform call resolves to success or exactly one of these kinds.
/// `NotListed` and `Cancelled` are produced by the orchestrator itself,
/// never by an adapter.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlatformError {
    /// Credentials are missing, expired, or rejected by the platform
    #[error("Authentication required: {0}")]
    AuthRequired(String),

    /// The platform rejected the listing payload
    #[error("Rejected by platform: {0}")]
    ValidationRejected(String),

    /// The platform throttled the call
    #[error("Rate limited{}", retry_after_display(.retry_after_secs))]
    RateLimited {
        /// Server-suggested wait before retrying, if provided
        retry_after_secs: Option<u64>,
    },

    /// Retryable network or server failure
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Non-retryable platform failure
    #[error("Fatal platform error: {0}")]
    Fatal(String),

    /// The operation targeted a platform with no recorded remote listing
    #[error("No listing recorded for this platform")]
    NotListed,

    /// The platform call was cancelled by an operation timeout
    #[error("Operation cancelled")]
    Cancelled,
}

impl PlatformError {
    /// Short label for this failure kind, used in logs and outcomes
    pub fn kind(&self) -> &'static str {
        match self {
            PlatformError::AuthRequired(_) => "auth_required",
            PlatformError::ValidationRejected(_) => "validation_rejected",
            PlatformError::RateLimited { .. } => "rate_limited",
            PlatformError::Transient(_) => "transient",
            PlatformError::Fatal(_) => "fatal",
            PlatformError::NotListed => "not_listed",
            PlatformError::Cancelled => "cancelled",
        }
    }
}

fn retry_after_display(retry_after: &Option<u64>) -> String {
    match retry_after {
        Some(secs) => format!(", retry after {} seconds", secs),
        None => String::new(),
    }
}

/// Local validation errors raised before any network dispatch
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// A required text field is empty
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Price must be non-negative
    #[error("Price must not be negative, got {0}")]
    NegativePrice(f64),

    /// A monetary amount on a sale is negative
    #[error("Amount `{0}` must not be negative, got {1}")]
    NegativeAmount(&'static str, f64),

    /// Photo sequence exceeds the configured bound
    #[error("Too many photos: {count} exceeds limit of {max}")]
    TooManyPhotos { count: usize, max: usize },

    /// Unrecognized condition label
    #[error("Unknown condition: {0}")]
    UnknownCondition(String),

    /// Unrecognized category label
    #[error("Unknown category: {0}")]
    UnknownCategory(String),
}

/// Repository-related errors
#[derive(Debug, Error)]
pub enum RepoError {
    /// SQLite error
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Async connection error
    #[error("Database connection error: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    /// Record serialization error
    #[error("Record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),
}

/// Application-level error type
///
/// Aggregates the domain-specific error types for callers that need a
/// single error surface (the CLI, mostly).
#[derive(Debug, Error)]
pub enum AppError {
    /// Platform call failure
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Local validation failure
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Repository failure
    #[error("Repository error: {0}")]
    Repository(#[from] RepoError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Trait for determining if an error is retryable
pub trait RetryableError {
    /// Returns true if the error is retryable
    fn is_retryable(&self) -> bool;
}

impl RetryableError for PlatformError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlatformError::Transient(_) | PlatformError::RateLimited { .. }
        )
    }
}
