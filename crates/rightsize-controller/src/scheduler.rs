//! Scaler scheduler — one background loop per scaler record.
//!
//! `sync` discovers records through the store and keeps the set of loops
//! in step with it. Each loop runs a tick, then sleeps for whatever the
//! tick asked for, until the record disappears or shutdown is signalled.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::reconciler::{Reconciler, Requeue};

/// Default period between record discoveries.
pub const DISCOVERY_INTERVAL: Duration = Duration::from_secs(15);

/// Per-record loop state.
struct LoopSlot {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

pub struct ScalerScheduler {
    reconciler: Arc<Reconciler>,
    /// Active loops: record key → slot.
    loops: Arc<RwLock<HashMap<String, LoopSlot>>>,
}

impl ScalerScheduler {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self {
            reconciler,
            loops: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn reconciler(&self) -> Arc<Reconciler> {
        Arc::clone(&self.reconciler)
    }

    /// Align running loops with the records in the store.
    ///
    /// Starts loops for new records, restarts loops that ended (a record
    /// deleted and recreated between discoveries), and stops loops whose
    /// record is gone. Returns the number of loops started.
    pub async fn sync(&self) -> anyhow::Result<usize> {
        let keys = self.reconciler.store().keys().await?;

        let mut started = 0;
        for key in &keys {
            let running = {
                let loops = self.loops.read().await;
                loops.get(key).is_some_and(|slot| !slot.handle.is_finished())
            };
            if !running {
                self.start_loop(key).await;
                started += 1;
            }
        }

        let stale: Vec<String> = {
            let loops = self.loops.read().await;
            loops
                .keys()
                .filter(|k| !keys.contains(k))
                .cloned()
                .collect()
        };
        for key in stale {
            self.stop_loop(&key).await;
        }

        Ok(started)
    }

    /// Start (or replace) the loop for `key`.
    pub async fn start_loop(&self, key: &str) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reconciler = Arc::clone(&self.reconciler);
        let owned_key = key.to_string();

        let handle = tokio::spawn(async move {
            run_scaler_loop(&owned_key, reconciler, shutdown_rx).await;
        });

        let mut loops = self.loops.write().await;
        if let Some(old) = loops.insert(
            key.to_string(),
            LoopSlot {
                handle,
                shutdown_tx,
            },
        ) {
            let _ = old.shutdown_tx.send(true);
            old.handle.abort();
        }

        info!(%key, "scaler loop started");
    }

    pub async fn stop_loop(&self, key: &str) {
        let mut loops = self.loops.write().await;
        if let Some(slot) = loops.remove(key) {
            let _ = slot.shutdown_tx.send(true);
            slot.handle.abort();
            info!(%key, "scaler loop stopped");
        }
    }

    /// Stop every loop (for graceful shutdown).
    pub async fn stop_all(&self) {
        let mut loops = self.loops.write().await;
        for (key, slot) in loops.drain() {
            let _ = slot.shutdown_tx.send(true);
            slot.handle.abort();
            debug!(%key, "scaler loop stopped");
        }
        info!("all scaler loops stopped");
    }

    /// Keys whose loop is still running.
    pub async fn active_loops(&self) -> Vec<String> {
        let loops = self.loops.read().await;
        let mut keys: Vec<String> = loops
            .iter()
            .filter(|(_, slot)| !slot.handle.is_finished())
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub async fn is_scheduled(&self, key: &str) -> bool {
        let loops = self.loops.read().await;
        loops.get(key).is_some_and(|slot| !slot.handle.is_finished())
    }

    /// Re-run discovery every `interval` until shutdown, then stop all loops.
    ///
    /// A zero `interval` falls back to [`DISCOVERY_INTERVAL`].
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let interval = if interval.is_zero() {
            warn!(
                fallback_secs = DISCOVERY_INTERVAL.as_secs(),
                "zero discovery interval, using default"
            );
            DISCOVERY_INTERVAL
        } else {
            interval
        };
        info!(interval_ms = interval.as_millis() as u64, "scaler scheduler started");
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sync().await {
                        Ok(0) => {}
                        Ok(started) => debug!(started, "scaler discovery started new loops"),
                        Err(e) => warn!(error = %e, "scaler discovery failed"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("scaler scheduler shutting down");
                    break;
                }
            }
        }

        self.stop_all().await;
    }
}

async fn run_scaler_loop(
    key: &str,
    reconciler: Arc<Reconciler>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(%key, "scaler loop starting");

    loop {
        let report = reconciler.reconcile(key).await;
        let wait = match report.requeue {
            Requeue::After(wait) => wait,
            Requeue::Never => break,
        };

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => {
                debug!(%key, "scaler loop shutting down");
                break;
            }
        }
    }
}
