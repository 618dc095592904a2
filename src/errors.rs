//! Typed error hierarchy for the clipflow workflow core.
//!
//! Three enums cover the taxonomy:
//! - `ValidationError` — client-side checks that never reach the network
//! - `ConcurrencyError` — operations rejected by per-work-item re-entrancy rules
//! - `StageError` — the top-level error returned by every workflow operation

use thiserror::Error;

/// Client-detected problems, raised before any request is issued.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Work item has no identifier")]
    MissingIdentifier,

    #[error("End time {end}s must be greater than start time {start}s")]
    InvalidOrder { start: f64, end: f64 },

    #[error("Clip duration {duration}s is outside the allowed range [{min}s, {max}s]")]
    DurationOutOfRange { duration: f64, min: f64, max: f64 },

    #[error("Suggestion index {index} is out of range (registry holds {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Operations disallowed by the per-work-item re-entrancy rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConcurrencyError {
    #[error("A pipeline run is already in flight for work item {work_item}")]
    AlreadyRunning { work_item: String },

    #[error("Suggestion {index} was replaced by a re-analysis before the edit could be committed")]
    StaleSuggestions { index: usize },
}

/// Errors surfaced by workflow operations.
///
/// `Validation` and `Concurrency` are resolved locally and never touch stage
/// flags or the suggestion registry. `Transport` and `Business` leave prior
/// state unchanged so the same operation can be retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{what} not found for work item {work_item}")]
    NotFound { what: String, work_item: String },

    #[error("{operation} could not reach the backend: {message}")]
    Transport { operation: String, message: String },

    #[error("{operation} failed: {message}")]
    Business { operation: String, message: String },

    #[error(transparent)]
    Concurrency(#[from] ConcurrencyError),
}

impl StageError {
    pub fn not_found(what: impl Into<String>, work_item: impl Into<String>) -> Self {
        StageError::NotFound {
            what: what.into(),
            work_item: work_item.into(),
        }
    }

    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        StageError::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn business(operation: impl Into<String>, message: impl Into<String>) -> Self {
        StageError::Business {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Errors decided on the client without a request being issued.
    pub fn is_local(&self) -> bool {
        matches!(self, StageError::Validation(_) | StageError::Concurrency(_))
    }

    /// Errors after which repeating the same operation is safe.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StageError::Transport { .. } | StageError::Business { .. }
        )
    }
}
