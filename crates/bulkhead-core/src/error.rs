//! Core error types for the bulkhead crate

use thiserror::Error;

/// Result type alias for bulkhead operations
pub type BulkheadResult<T> = Result<T, BulkheadError>;

/// Main error type for the bulkhead crate
///
/// Failures are recovered at the smallest possible scope (one token
/// acquisition, one reconnect, one work item) and only aggregated upward;
/// the variants here are what escapes that recovery.
#[derive(Error, Debug, Clone)]
pub enum BulkheadError {
    /// Invalid configuration, rejected at construction time
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// HTTP transport errors, including connection failures that survived
    /// the pool's one-shot reconnect
    #[error("HTTP error: {message}")]
    Http {
        message: String,
        url: Option<String>,
        status_code: Option<u16>,
    },

    /// An operation exceeded its time budget
    #[error("Timeout: {message}")]
    Timeout { message: String },

    /// A single work item failed
    #[error("Task error: {id}: {message}")]
    Task { id: String, message: String },

    /// A fail-fast run was aborted by a failing work item
    #[error("Run aborted by task '{id}': {message} ({completed} tasks completed)")]
    Aborted {
        id: String,
        message: String,
        completed: usize,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json { message: String },

    /// The operation was cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Anything that does not fit the variants above
    #[error("{message}")]
    Other { message: String },
}

impl BulkheadError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an HTTP error without URL or status context
    pub fn http(message: impl Into<String>) -> Self {
        Self::Http {
            message: message.into(),
            url: None,
            status_code: None,
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a task error
    pub fn task(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Task {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for BulkheadError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http {
            message: err.to_string(),
            url: err.url().map(|u| u.to_string()),
            status_code: err.status().map(|s| s.as_u16()),
        }
    }
}

impl From<serde_json::Error> for BulkheadError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}
