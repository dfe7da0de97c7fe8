//! Error types shared across rightsize crates.

use thiserror::Error;

/// Configuration and validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid scaler spec: {0}")]
    InvalidSpec(String),

    #[error("invalid duration: {0:?}")]
    InvalidDuration(String),
}

/// Errors surfaced by platform collaborators (verifier, sampler, applier).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The metric source answered but returned no datapoints for the window.
    #[error("no datapoints returned for queue {queue}")]
    NoDatapoints { queue: String },

    #[error("function not found: {0}")]
    FunctionNotFound(String),

    #[error("queue not found: {0}")]
    QueueNotFound(String),

    /// The platform could not be reached or rejected the call.
    #[error("platform call failed: {0}")]
    Unavailable(String),
}
