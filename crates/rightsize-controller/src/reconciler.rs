//! Reconciler — one tick of the concurrency control loop.
//!
//! A tick reads the scaler record, runs the gate, and if allowed verifies
//! the function and its queue trigger, samples the backlog, computes the
//! next concurrency, and applies it. Every collaborator call is bounded by
//! `call_timeout`. Failures never escape: they become an `Error` state,
//! get logged, and the record is re-ticked on the normal cadence.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use rightsize_core::config::ControllerConfig;
use rightsize_core::{
    BacklogSampler, ConcurrencyApplier, CoreError, GaugeLabels, GaugeSink, PreconditionVerifier,
    RecordStore, SampleWindow, ScalerRecord, ScalerState, ScalerStatus,
};

use crate::calculator::{Decision, decide};
use crate::error::ReconcileError;
use crate::gate::{COOLDOWN, allowed_with_cooldown};
use crate::locks::KeyedLocks;

/// Default tick cadence.
pub const REQUEUE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default per-call deadline for collaborators.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// The external systems a tick talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn RecordStore>,
    pub verifier: Arc<dyn PreconditionVerifier>,
    pub sampler: Arc<dyn BacklogSampler>,
    pub applier: Arc<dyn ConcurrencyApplier>,
    pub gauges: Arc<dyn GaugeSink>,
}

/// Loop timings.
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    pub requeue_interval: Duration,
    pub cooldown: Duration,
    pub call_timeout: Duration,
    pub sample_window: SampleWindow,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            requeue_interval: REQUEUE_INTERVAL,
            cooldown: COOLDOWN,
            call_timeout: CALL_TIMEOUT,
            sample_window: SampleWindow::DEFAULT,
        }
    }
}

impl ReconcileSettings {
    pub fn from_config(config: &ControllerConfig) -> Result<Self, CoreError> {
        Ok(Self {
            requeue_interval: config.requeue_interval()?,
            cooldown: config.cooldown()?,
            call_timeout: config.call_timeout()?,
            sample_window: SampleWindow::DEFAULT,
        })
    }
}

/// When the record should be ticked again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    After(Duration),
    /// The record is gone; scheduling for it ends.
    Never,
}

/// What a tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// The gate was closed (cooldown or `Error` state).
    Skipped,
    Adjusted(Decision),
    Failed(ReconcileError),
    Missing,
}

#[derive(Debug)]
pub struct TickReport {
    pub key: String,
    pub requeue: Requeue,
    pub outcome: TickOutcome,
    /// Status as last written (or attempted) by this tick.
    pub status: Option<ScalerStatus>,
}

/// JSON-friendly view of a [`TickReport`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickSummary {
    pub key: String,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requeue_after_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ScalerStatus>,
}

impl TickReport {
    pub fn summary(&self) -> TickSummary {
        let (outcome, decision, error) = match &self.outcome {
            TickOutcome::Skipped => ("skipped", None, None),
            TickOutcome::Adjusted(d) => ("adjusted", Some(*d), None),
            TickOutcome::Failed(e) => ("failed", None, Some(e.to_string())),
            TickOutcome::Missing => ("missing", None, None),
        };
        TickSummary {
            key: self.key.clone(),
            outcome,
            decision,
            error,
            requeue_after_secs: match self.requeue {
                Requeue::After(d) => Some(d.as_secs()),
                Requeue::Never => None,
            },
            status: self.status.clone(),
        }
    }
}

/// Drives scaler records toward the concurrency their backlog calls for.
pub struct Reconciler {
    collab: Collaborators,
    settings: ReconcileSettings,
    locks: KeyedLocks,
}

impl Reconciler {
    pub fn new(collab: Collaborators, settings: ReconcileSettings) -> Self {
        Self {
            collab,
            settings,
            locks: KeyedLocks::new(),
        }
    }

    pub fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        Arc::clone(&self.collab.store)
    }

    /// Exclusive access to `key`, shared with ticks. Hold it while mutating
    /// a record's status from outside the loop.
    pub async fn lock(&self, key: &str) -> tokio::sync::OwnedMutexGuard<()> {
        self.locks.lock(key).await
    }

    /// Run one tick for `key` against the wall clock.
    pub async fn reconcile(&self, key: &str) -> TickReport {
        self.reconcile_at(key, Utc::now()).await
    }

    /// Run one tick for `key`, treating `now` as the current time.
    ///
    /// Ticks for the same key are serialized; different keys run in parallel.
    pub async fn reconcile_at(&self, key: &str, now: DateTime<Utc>) -> TickReport {
        let _guard = self.locks.lock(key).await;
        debug!(%key, "reconcile started");

        let requeue = Requeue::After(self.settings.requeue_interval);
        let mut record = match self.bounded("record read", self.collab.store.get(key)).await {
            Ok(Ok(Some(record))) => record,
            Ok(Ok(None)) => {
                info!(%key, "scaler record no longer exists, scheduling stopped");
                return TickReport {
                    key: key.to_string(),
                    requeue: Requeue::Never,
                    outcome: TickOutcome::Missing,
                    status: None,
                };
            }
            Ok(Err(e)) => {
                warn!(%key, error = %e, "unable to read scaler record");
                return TickReport {
                    key: key.to_string(),
                    requeue,
                    outcome: TickOutcome::Failed(ReconcileError::Read(e.to_string())),
                    status: None,
                };
            }
            Err(e) => {
                warn!(%key, error = %e, "unable to read scaler record");
                return TickReport {
                    key: key.to_string(),
                    requeue,
                    outcome: TickOutcome::Failed(e),
                    status: None,
                };
            }
        };

        if record.status.state.is_none() {
            record.status.state = Some(ScalerState::Pending);
            self.persist(&record).await;
        }

        if !allowed_with_cooldown(
            self.settings.cooldown,
            record.status.state,
            record.status.adjusted_at,
            now,
        ) {
            debug!(
                %key,
                state = ?record.status.state,
                adjusted_at = ?record.status.adjusted_at,
                "adjustment not allowed yet"
            );
            return TickReport {
                key: key.to_string(),
                requeue,
                outcome: TickOutcome::Skipped,
                status: Some(record.status),
            };
        }

        let outcome = match self.adjust(&mut record).await {
            Ok((decision, backlog)) => {
                record.status.state = Some(ScalerState::Adjusted);
                record.status.concurrency = decision.new;
                record.status.adjusted_at = Some(now);
                self.collab
                    .gauges
                    .set_gauge(GaugeLabels::for_record(&record), f64::from(decision.new));
                info!(
                    %key,
                    function = %record.spec.function_id,
                    old = decision.old,
                    new = decision.new,
                    direction = %decision.direction,
                    backlog,
                    "reserved concurrency adjusted"
                );
                TickOutcome::Adjusted(decision)
            }
            Err(e) => {
                error!(%key, error = %e, "concurrency adjustment failed");
                record.status.state = Some(ScalerState::Error);
                TickOutcome::Failed(e)
            }
        };

        self.persist(&record).await;
        debug!(%key, state = ?record.status.state, "reconcile finished");

        TickReport {
            key: key.to_string(),
            requeue,
            outcome,
            status: Some(record.status),
        }
    }

    /// Preconditions, sampling, calculation, and apply.
    ///
    /// Marks the record `Adjusting` (and persists) once preconditions pass.
    /// Returns the applied decision and the backlog average it was based on.
    async fn adjust(&self, record: &mut ScalerRecord) -> Result<(Decision, f64), ReconcileError> {
        let spec = record.spec.clone();

        let exists = self
            .bounded("function lookup", self.collab.verifier.function_exists(&spec.function_id))
            .await?
            .map_err(ReconcileError::Precondition)?;
        if !exists {
            return Err(ReconcileError::FunctionMissing {
                function: spec.function_id,
            });
        }

        let wired = self
            .bounded(
                "trigger lookup",
                self.collab
                    .verifier
                    .trigger_registered(&spec.function_id, &spec.queue_id),
            )
            .await?
            .map_err(ReconcileError::Precondition)?;
        if !wired {
            return Err(ReconcileError::TriggerMissing {
                function: spec.function_id,
                queue: spec.queue_id,
            });
        }

        record.status.state = Some(ScalerState::Adjusting);
        self.persist(record).await;

        let sample = self
            .bounded(
                "backlog sampling",
                self.collab
                    .sampler
                    .sample(&spec.queue_id, self.settings.sample_window),
            )
            .await?
            .map_err(ReconcileError::Sampling)?;
        debug!(
            queue = %spec.queue_id,
            backlog = sample.average,
            datapoints = sample.datapoints,
            "backlog sampled"
        );

        let current = self
            .bounded("concurrency lookup", self.collab.applier.current(&spec.function_id))
            .await?
            .map_err(ReconcileError::CurrentConcurrency)?
            .unwrap_or(record.status.concurrency);

        let decision = decide(
            current,
            sample.average,
            spec.backlog_threshold,
            spec.min_concurrency,
            spec.max_concurrency,
            spec.step_concurrency,
        );

        self.bounded(
            "concurrency update",
            self.collab.applier.apply(&spec.function_id, decision.new),
        )
        .await?
        .map_err(|source| ReconcileError::Apply {
            concurrency: decision.new,
            source,
        })?;

        Ok((decision, sample.average))
    }

    /// Best-effort status write; failures are logged and the next tick
    /// re-reads whatever was committed.
    async fn persist(&self, record: &ScalerRecord) {
        let err = match self
            .bounded("status write", self.collab.store.update_status(record))
            .await
        {
            Ok(Ok(())) => return,
            Ok(Err(e)) => ReconcileError::Persistence(e.to_string()),
            Err(e) => e,
        };
        warn!(key = %record.table_key(), error = %err, "unable to persist scaler status");
    }

    async fn bounded<T>(
        &self,
        step: &'static str,
        fut: impl Future<Output = T>,
    ) -> Result<T, ReconcileError> {
        tokio::time::timeout(self.settings.call_timeout, fut)
            .await
            .map_err(|_| ReconcileError::Timeout {
                step,
                after: self.settings.call_timeout,
            })
    }
}
