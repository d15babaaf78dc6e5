//! Error types for release orchestration.
//!
//! Errors are categorized so callers can tell client mistakes (bad
//! ruleset, bad option combination, unknown item) from fatal failures
//! of the underlying store. Blocking conditions such as an incomplete
//! e-sign manifest are never errors; they are reported as step results.

use crate::collaborators::CollaboratorError;
use crate::types::{ExecutionResult, ReleaseKind, ResultKind};
use thiserror::Error;

/// Categories of orchestration errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Request was malformed (unknown ruleset, bad limits, bad options)
    Validation,
    /// Root item does not exist
    NotFound,
    /// Storage failure or failed compensation
    Fatal,
}

impl ErrorCategory {
    /// Whether the caller can fix this by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation | Self::NotFound)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Invalid request",
            Self::NotFound => "Not found",
            Self::Fatal => "Release orchestration failed",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Validation => "Fix the request options and try again",
            Self::NotFound => "Check the item id",
            Self::Fatal => {
                "Inspect the reported results; released artifacts may need manual reopening"
            }
        }
    }
}

/// Errors that can occur while planning or executing a release.
#[derive(Debug, Error)]
pub enum Error {
    /// Ruleset id does not resolve for a kind
    #[error("Unknown release ruleset: {ruleset_id} for {kind} (known: {})", known.join(", "))]
    UnknownRuleset {
        kind: ReleaseKind,
        ruleset_id: String,
        /// Ruleset ids that do resolve for this kind
        known: Vec<String>,
    },

    /// Configured ruleset is malformed
    #[error("invalid ruleset configuration for {kind}: {message}")]
    InvalidRulesetConfig { kind: String, message: String },

    /// Mutually exclusive execute options were combined
    #[error("{0}")]
    InvalidOptionCombination(String),

    /// Candidate limit outside the accepted range
    #[error("{name} must be between 0 and {max}, got {value}")]
    InvalidLimit { name: String, value: u32, max: u32 },

    /// Root item is unknown
    #[error("item not found: {0}")]
    ItemNotFound(String),

    /// A collaborator failed while serving the request
    #[error("{operation} failed: {source}")]
    Collaborator {
        operation: String,
        #[source]
        source: CollaboratorError,
    },

    /// Compensation failed partway through rollback
    #[error("rollback failed at {kind} {resource_id}: {message}")]
    RollbackFailed {
        kind: ResultKind,
        resource_id: String,
        message: String,
        /// Results recorded before the failure, for manual recovery
        results: Vec<ExecutionResult>,
    },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownRuleset { .. }
            | Self::InvalidRulesetConfig { .. }
            | Self::InvalidOptionCombination(_)
            | Self::InvalidLimit { .. } => ErrorCategory::Validation,
            Self::ItemNotFound(_) => ErrorCategory::NotFound,
            Self::Collaborator { .. } | Self::RollbackFailed { .. } | Self::Serialization(_) => {
                ErrorCategory::Fatal
            }
        }
    }

    /// Whether the caller can fix this by changing the request.
    pub fn is_client_error(&self) -> bool {
        self.category().is_client_error()
    }

    /// Wrap a collaborator failure with the operation that was running.
    pub fn collaborator(operation: impl Into<String>, source: CollaboratorError) -> Self {
        Self::Collaborator {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for orchestration operations.
pub type Result<T> = std::result::Result<T, Error>;
