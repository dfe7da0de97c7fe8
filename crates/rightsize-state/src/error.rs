//! Error types for the scaler record store.

use thiserror::Error;

/// Result type alias for record store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Failures while reading or writing scaler records.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open record store: {0}")]
    Open(String),

    /// Beginning or committing a redb transaction failed.
    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    /// A get/insert/remove/iterate call on the scalers table failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A record could not be encoded to or decoded from JSON.
    #[error("record codec error for {key}: {reason}")]
    Codec { key: String, reason: String },

    #[error("scaler record not found: {0}")]
    NotFound(String),
}
