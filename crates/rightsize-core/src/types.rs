//! Domain types for scaler records.
//!
//! A `ScalerRecord` pairs the user-declared `ScalerSpec` with the
//! loop-owned `ScalerStatus`. Records are JSON-serialized with camelCase
//! field names so the persisted shape matches what inspection tooling reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Store key for a scaler record: `{namespace}/{name}`.
pub type ScalerKey = String;

// ── Spec ──────────────────────────────────────────────────────────

/// Desired scaling behaviour for one function/queue pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScalerSpec {
    /// Name of the upstream queue whose backlog drives scaling.
    pub queue_id: String,
    /// Average backlog above which concurrency is stepped up.
    pub backlog_threshold: i32,
    /// Name of the function whose reserved concurrency is managed.
    pub function_id: String,
    pub min_concurrency: i32,
    pub max_concurrency: i32,
    /// Amount added or removed per adjustment.
    pub step_concurrency: i32,
}

impl ScalerSpec {
    /// Reject specs the loop cannot act on.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.queue_id.trim().is_empty() {
            return Err(CoreError::InvalidSpec("queueId must not be empty".into()));
        }
        if self.function_id.trim().is_empty() {
            return Err(CoreError::InvalidSpec("functionId must not be empty".into()));
        }
        if self.backlog_threshold < 0 {
            return Err(CoreError::InvalidSpec(format!(
                "backlogThreshold must be >= 0, got {}",
                self.backlog_threshold
            )));
        }
        if self.min_concurrency < 0 {
            return Err(CoreError::InvalidSpec(format!(
                "minConcurrency must be >= 0, got {}",
                self.min_concurrency
            )));
        }
        if self.min_concurrency > self.max_concurrency {
            return Err(CoreError::InvalidSpec(format!(
                "minConcurrency ({}) exceeds maxConcurrency ({})",
                self.min_concurrency, self.max_concurrency
            )));
        }
        if self.step_concurrency <= 0 {
            return Err(CoreError::InvalidSpec(format!(
                "stepConcurrency must be > 0, got {}",
                self.step_concurrency
            )));
        }
        Ok(())
    }
}

// ── Status ────────────────────────────────────────────────────────

/// Adjustment state of a scaler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalerState {
    Pending,
    Adjusting,
    Adjusted,
    Error,
}

impl std::fmt::Display for ScalerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScalerState::Pending => "Pending",
            ScalerState::Adjusting => "Adjusting",
            ScalerState::Adjusted => "Adjusted",
            ScalerState::Error => "Error",
        };
        f.write_str(s)
    }
}

/// Observed state, written only by the reconciliation loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScalerStatus {
    /// `None` until the loop has seen the record once.
    #[serde(default)]
    pub state: Option<ScalerState>,
    /// Last concurrency the loop applied.
    #[serde(default)]
    pub concurrency: i32,
    /// When the last successful adjustment happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjusted_at: Option<DateTime<Utc>>,
}

// ── Record ────────────────────────────────────────────────────────

/// A declared scaling target plus its observed status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScalerRecord {
    pub namespace: String,
    pub name: String,
    pub spec: ScalerSpec,
    #[serde(default)]
    pub status: ScalerStatus,
}

impl ScalerRecord {
    /// Create a fresh record with an empty status.
    pub fn new(namespace: &str, name: &str, spec: ScalerSpec) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            spec,
            status: ScalerStatus::default(),
        }
    }

    /// Build the composite key for the scalers table.
    pub fn table_key(&self) -> ScalerKey {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Read-only projection handed to inspection tooling.
    pub fn status_view(&self) -> StatusView {
        StatusView {
            key: self.table_key(),
            state: self.status.state,
            concurrency: self.status.concurrency,
            adjusted_at: self.status.adjusted_at,
        }
    }
}

/// What external tooling sees of a scaler's progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub key: ScalerKey,
    pub state: Option<ScalerState>,
    pub concurrency: i32,
    pub adjusted_at: Option<DateTime<Utc>>,
}
