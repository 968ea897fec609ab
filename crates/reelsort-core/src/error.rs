//! Error types for the Reelsort engine.
//!
//! Per-file and per-item failures are surfaced through these variants so callers
//! can aggregate them into counts instead of aborting whole scans.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the Reelsort library.
#[derive(Debug, Error)]
pub enum ReelsortError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// The AI circuit breaker is rejecting calls. Expected outcome, not a fault.
    #[error("Circuit breaker open for {domain}")]
    CircuitBreakerOpen { domain: String },

    // AI errors
    #[error("AI response could not be used: {message}")]
    AiResponse { message: String },

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A move target is already occupied. Nothing was changed.
    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error("Transfer from {src} to {dest} failed: {reason}")]
    TransferFailed {
        src: PathBuf,
        dest: PathBuf,
        reason: String,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Classification errors
    #[error("Could not parse media identity from {path}")]
    Unparseable { path: PathBuf },

    // Index errors
    #[error("Media file not found: {id}")]
    MediaFileNotFound { id: i64 },

    // Plan errors
    #[error("Unknown audit action: {0}")]
    UnknownAction(String),

    /// The index row is gone but the file is still on disk.
    #[error("Removed index record for {path} but the file could not be deleted: {reason}")]
    RecordRemovedDespiteFsFailure { path: PathBuf, reason: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Reelsort operations.
pub type Result<T> = std::result::Result<T, ReelsortError>;

// Conversion implementations for common error types

impl From<std::io::Error> for ReelsortError {
    fn from(err: std::io::Error) -> Self {
        ReelsortError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ReelsortError {
    fn from(err: serde_json::Error) -> Self {
        ReelsortError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for ReelsortError {
    fn from(err: rusqlite::Error) -> Self {
        ReelsortError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for ReelsortError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ReelsortError::Timeout(std::time::Duration::from_secs(0))
        } else {
            ReelsortError::Network {
                message: err.to_string(),
                cause: Some(err.to_string()),
            }
        }
    }
}

impl From<crate::cancel::CancelledError> for ReelsortError {
    fn from(_: crate::cancel::CancelledError) -> Self {
        ReelsortError::Cancelled
    }
}

impl ReelsortError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ReelsortError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Error used when the index connection mutex is poisoned.
    pub(crate) fn lock_poisoned() -> Self {
        ReelsortError::Database {
            message: "Failed to acquire connection lock".to_string(),
            source: None,
        }
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReelsortError::Network { .. } | ReelsortError::Timeout(_)
        )
    }

    /// True for the breaker rejection, which callers count separately from failures.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ReelsortError::CircuitBreakerOpen { .. })
    }
}
