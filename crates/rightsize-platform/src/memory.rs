//! In-memory platform — functions, their event sources, and queue metrics.
//!
//! Functions carry an optional reserved concurrency and a list of event
//! source ARNs. A queue counts as a function's trigger when the trailing
//! `:`-separated segment of one of those ARNs equals the queue name.
//! Queues carry the raw datapoints the sampler averages.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use rightsize_core::config::PlatformConfig;
use rightsize_core::{
    BacklogSampler, ConcurrencyApplier, PlatformError, PreconditionVerifier, Sample,
    SampleWindow,
};

/// Platform operations that tests can fail or count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FunctionExists,
    TriggerRegistered,
    Sample,
    Current,
    Apply,
}

/// Per-operation call counters.
#[derive(Debug, Default)]
struct Counters {
    function_exists: AtomicU64,
    trigger_registered: AtomicU64,
    sample: AtomicU64,
    current: AtomicU64,
    apply: AtomicU64,
}

impl Counters {
    fn slot(&self, op: Operation) -> &AtomicU64 {
        match op {
            Operation::FunctionExists => &self.function_exists,
            Operation::TriggerRegistered => &self.trigger_registered,
            Operation::Sample => &self.sample,
            Operation::Current => &self.current,
            Operation::Apply => &self.apply,
        }
    }
}

/// Point-in-time copy of the call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub function_exists: u64,
    pub trigger_registered: u64,
    pub sample: u64,
    pub current: u64,
    pub apply: u64,
}

#[derive(Debug, Clone)]
struct FunctionEntry {
    reserved_concurrency: Option<i32>,
    triggers: Vec<String>,
}

#[derive(Debug, Default)]
struct PlatformState {
    functions: HashMap<String, FunctionEntry>,
    queues: HashMap<String, Vec<f64>>,
    failures: HashMap<Operation, PlatformError>,
    latency: Option<Duration>,
}

/// Shared in-memory platform. Clones observe the same state.
#[derive(Clone, Default)]
pub struct InMemoryPlatform {
    state: Arc<RwLock<PlatformState>>,
    counters: Arc<Counters>,
}

/// Extract the queue name from an event source ARN (its last `:` segment).
pub fn queue_name_from_arn(arn: &str) -> &str {
    arn.rsplit(':').next().unwrap_or(arn)
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a platform from the `[platform]` config section.
    pub fn from_config(config: &PlatformConfig) -> Self {
        let mut state = PlatformState::default();
        for f in &config.functions {
            state.functions.insert(
                f.name.clone(),
                FunctionEntry {
                    reserved_concurrency: f.reserved_concurrency,
                    triggers: f.triggers.clone(),
                },
            );
        }
        for q in &config.queues {
            state.queues.insert(q.name.clone(), q.datapoints.clone());
        }
        debug!(
            functions = state.functions.len(),
            queues = state.queues.len(),
            "in-memory platform seeded"
        );
        Self {
            state: Arc::new(RwLock::new(state)),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Register (or replace) a function.
    pub async fn put_function(
        &self,
        name: &str,
        reserved_concurrency: Option<i32>,
        triggers: &[&str],
    ) {
        let mut state = self.state.write().await;
        state.functions.insert(
            name.to_string(),
            FunctionEntry {
                reserved_concurrency,
                triggers: triggers.iter().map(|t| t.to_string()).collect(),
            },
        );
    }

    pub async fn remove_function(&self, name: &str) -> bool {
        self.state.write().await.functions.remove(name).is_some()
    }

    /// Replace the datapoints reported for a queue's current window.
    pub async fn set_datapoints(&self, queue: &str, datapoints: Vec<f64>) {
        let mut state = self.state.write().await;
        state.queues.insert(queue.to_string(), datapoints);
    }

    /// Make every subsequent call of `op` fail with `error`.
    pub async fn fail(&self, op: Operation, error: PlatformError) {
        self.state.write().await.failures.insert(op, error);
    }

    pub async fn clear_failures(&self) {
        self.state.write().await.failures.clear();
    }

    /// Delay every call by `latency` before answering.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        self.state.write().await.latency = latency;
    }

    /// Reserved concurrency currently configured for a function.
    pub async fn reserved_concurrency(&self, name: &str) -> Option<i32> {
        let state = self.state.read().await;
        state.functions.get(name).and_then(|f| f.reserved_concurrency)
    }

    pub fn calls(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            function_exists: c.function_exists.load(Ordering::Relaxed),
            trigger_registered: c.trigger_registered.load(Ordering::Relaxed),
            sample: c.sample.load(Ordering::Relaxed),
            current: c.current.load(Ordering::Relaxed),
            apply: c.apply.load(Ordering::Relaxed),
        }
    }

    /// Count the call, wait out any injected latency, and surface any
    /// injected failure.
    async fn enter(&self, op: Operation) -> Result<(), PlatformError> {
        self.counters.slot(op).fetch_add(1, Ordering::Relaxed);
        let (latency, failure) = {
            let state = self.state.read().await;
            (state.latency, state.failures.get(&op).cloned())
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PreconditionVerifier for InMemoryPlatform {
    async fn function_exists(&self, function_id: &str) -> Result<bool, PlatformError> {
        self.enter(Operation::FunctionExists).await?;
        Ok(self.state.read().await.functions.contains_key(function_id))
    }

    async fn trigger_registered(
        &self,
        function_id: &str,
        queue_id: &str,
    ) -> Result<bool, PlatformError> {
        self.enter(Operation::TriggerRegistered).await?;
        let state = self.state.read().await;
        Ok(state.functions.get(function_id).is_some_and(|f| {
            f.triggers
                .iter()
                .any(|arn| queue_name_from_arn(arn) == queue_id)
        }))
    }
}

#[async_trait]
impl BacklogSampler for InMemoryPlatform {
    async fn sample(&self, queue_id: &str, window: SampleWindow) -> Result<Sample, PlatformError> {
        self.enter(Operation::Sample).await?;
        let state = self.state.read().await;
        // A metric source knows nothing about unknown queues: same as no data.
        let datapoints = state.queues.get(queue_id).map(Vec::as_slice).unwrap_or(&[]);
        Sample::from_datapoints(queue_id, window, datapoints)
    }
}

#[async_trait]
impl ConcurrencyApplier for InMemoryPlatform {
    async fn current(&self, function_id: &str) -> Result<Option<i32>, PlatformError> {
        self.enter(Operation::Current).await?;
        let state = self.state.read().await;
        state
            .functions
            .get(function_id)
            .map(|f| f.reserved_concurrency)
            .ok_or_else(|| PlatformError::FunctionNotFound(function_id.to_string()))
    }

    async fn apply(&self, function_id: &str, concurrency: i32) -> Result<(), PlatformError> {
        self.enter(Operation::Apply).await?;
        let mut state = self.state.write().await;
        let function = state
            .functions
            .get_mut(function_id)
            .ok_or_else(|| PlatformError::FunctionNotFound(function_id.to_string()))?;
        function.reserved_concurrency = Some(concurrency);
        debug!(%function_id, concurrency, "reserved concurrency updated");
        Ok(())
    }
}
