//! Error types for the PLM store

use orchestration::{CollaboratorError, ErrorCategory};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error in a stored column
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Referenced record does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Operation conflicts with current state
    #[error("{0}")]
    Conflict(String),

    /// Fixture or input is malformed
    #[error("invalid input: {0}")]
    Invalid(String),

    /// Database path could not be prepared
    #[error("cannot open store at {}: {message}", .path.display())]
    Open { path: PathBuf, message: String },
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Conflict(_) | Self::Invalid(_) => ErrorCategory::Validation,
            Self::Database(_) | Self::Io(_) | Self::Json(_) | Self::Open { .. } => {
                ErrorCategory::Fatal
            }
        }
    }

    /// Whether the caller can fix this by changing the request.
    pub fn is_client_error(&self) -> bool {
        self.category().is_client_error()
    }
}

impl From<Error> for CollaboratorError {
    fn from(err: Error) -> Self {
        Self::new(err)
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, Error>;
