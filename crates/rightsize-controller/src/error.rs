//! Reconciliation failures. None of these escape a tick: each becomes an
//! `Error` state transition plus a log line.

use std::time::Duration;

use thiserror::Error;

use rightsize_core::PlatformError;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("function {function} does not exist")]
    FunctionMissing { function: String },

    #[error("queue {queue} is not a registered trigger of function {function}")]
    TriggerMissing { function: String, queue: String },

    /// The verifier itself failed; treated the same as a missing precondition.
    #[error("precondition check failed: {0}")]
    Precondition(#[source] PlatformError),

    #[error("backlog sampling failed: {0}")]
    Sampling(#[source] PlatformError),

    #[error("reading current concurrency failed: {0}")]
    CurrentConcurrency(#[source] PlatformError),

    #[error("applying concurrency {concurrency} failed: {source}")]
    Apply {
        concurrency: i32,
        #[source]
        source: PlatformError,
    },

    #[error("record read failed: {0}")]
    Read(String),

    #[error("status write failed: {0}")]
    Persistence(String),

    #[error("{step} timed out after {after:?}")]
    Timeout { step: &'static str, after: Duration },
}

impl ReconcileError {
    /// Whether the failure came from the function/trigger checks.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ReconcileError::FunctionMissing { .. }
                | ReconcileError::TriggerMissing { .. }
                | ReconcileError::Precondition(_)
        )
    }
}
