//! Collaborator traits consumed by the reconciliation loop.
//!
//! The loop never talks to a platform, a metric source, or a database
//! directly. Each concern sits behind one of these traits so the
//! controller can be driven by the redb store and in-memory platform
//! in tests, or by real cloud adapters in production.

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::sample::{Sample, SampleWindow};
use crate::types::{ScalerKey, ScalerRecord};

/// Persistence for scaler records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a record by `{namespace}/{name}` key. `Ok(None)` means deleted.
    async fn get(&self, key: &str) -> anyhow::Result<Option<ScalerRecord>>;

    /// Write back only the status portion of `record`.
    async fn update_status(&self, record: &ScalerRecord) -> anyhow::Result<()>;

    /// Keys of every record currently declared, used for scheduling discovery.
    async fn keys(&self) -> anyhow::Result<Vec<ScalerKey>>;
}

/// Existence and wiring checks run before every adjustment.
#[async_trait]
pub trait PreconditionVerifier: Send + Sync {
    async fn function_exists(&self, function_id: &str) -> Result<bool, PlatformError>;

    /// Whether `queue_id` is registered as an event source of the function.
    async fn trigger_registered(
        &self,
        function_id: &str,
        queue_id: &str,
    ) -> Result<bool, PlatformError>;
}

/// Source of queue backlog measurements.
#[async_trait]
pub trait BacklogSampler: Send + Sync {
    /// Average visible backlog of `queue_id` over `window`.
    ///
    /// Must return `PlatformError::NoDatapoints` rather than `0.0` when the
    /// metric source has nothing for the window.
    async fn sample(&self, queue_id: &str, window: SampleWindow) -> Result<Sample, PlatformError>;
}

/// Platform-side reserved concurrency control.
#[async_trait]
pub trait ConcurrencyApplier: Send + Sync {
    /// Current reserved concurrency, `None` if the function has none set.
    async fn current(&self, function_id: &str) -> Result<Option<i32>, PlatformError>;

    async fn apply(&self, function_id: &str, concurrency: i32) -> Result<(), PlatformError>;
}

/// Label tuple identifying one concurrency gauge series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GaugeLabels {
    /// Target scope (record namespace).
    pub namespace: String,
    /// Controller identity (record name).
    pub controller: String,
    pub function: String,
    pub queue: String,
}

impl GaugeLabels {
    pub fn for_record(record: &ScalerRecord) -> Self {
        Self {
            namespace: record.namespace.clone(),
            controller: record.name.clone(),
            function: record.spec.function_id.clone(),
            queue: record.spec.queue_id.clone(),
        }
    }
}

/// Process-wide observability sink, written concurrently by all ticks.
pub trait GaugeSink: Send + Sync {
    fn set_gauge(&self, labels: GaugeLabels, value: f64);
}
