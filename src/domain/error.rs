//! Domain-level error types for labcode-export.
//!
//! All errors are typed with `thiserror` and map onto the response taxonomy
//! used by the export surface: caller error, not found, backend unavailable,
//! internal failure.

use thiserror::Error;

/// Export subsystem errors with a stable response-category mapping.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Malformed request input (empty or oversized run-id set, bad path).
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Run or virtual path does not resolve.
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Storage backend cannot be reached.
    #[error("Backend unavailable: {message}")]
    Unavailable { message: String },

    /// Failed to open or query the relational store.
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// JSON serialization failed (manifest assembly).
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Anything unexpected; details are logged, not echoed verbatim.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ExportError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a backend-unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create a database error from a rusqlite error.
    pub fn database(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Create a JSON error.
    pub fn json(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Result type alias using `ExportError`.
pub type Result<T> = std::result::Result<T, ExportError>;
