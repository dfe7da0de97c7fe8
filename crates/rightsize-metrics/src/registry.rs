//! Gauge registry — thread-safe labeled-value store.
//!
//! One value per label tuple. Writers from concurrent ticks only contend
//! on the map lock for the duration of a single insert.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use rightsize_core::{GaugeLabels, GaugeSink};

/// Shared concurrency gauge keyed by scaler labels.
#[derive(Clone, Default)]
pub struct GaugeRegistry {
    values: Arc<RwLock<HashMap<GaugeLabels, f64>>>,
}

impl GaugeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value for a label tuple, if one was ever set.
    pub fn get(&self, labels: &GaugeLabels) -> Option<f64> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.get(labels).copied()
    }

    /// Drop every series belonging to the scaler `{namespace}/{controller}`.
    ///
    /// Returns the number of series removed.
    pub fn forget(&self, namespace: &str, controller: &str) -> usize {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        let before = values.len();
        values.retain(|labels, _| !(labels.namespace == namespace && labels.controller == controller));
        let removed = before - values.len();
        if removed > 0 {
            debug!(%namespace, %controller, removed, "gauge series dropped");
        }
        removed
    }

    /// All series sorted by labels, for stable exposition output.
    pub fn snapshot(&self) -> Vec<(GaugeLabels, f64)> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<_> = values.iter().map(|(k, v)| (k.clone(), *v)).collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub fn len(&self) -> usize {
        self.values.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl GaugeSink for GaugeRegistry {
    fn set_gauge(&self, labels: GaugeLabels, value: f64) {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(labels, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(namespace: &str, controller: &str, function: &str) -> GaugeLabels {
        GaugeLabels {
            namespace: namespace.to_string(),
            controller: controller.to_string(),
            function: function.to_string(),
            queue: "orders".to_string(),
        }
    }

    #[test]
    fn set_overwrites_previous_value() {
        let registry = GaugeRegistry::new();
        registry.set_gauge(labels("default", "orders", "fn"), 10.0);
        registry.set_gauge(labels("default", "orders", "fn"), 15.0);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&labels("default", "orders", "fn")), Some(15.0));
    }

    #[test]
    fn forget_drops_only_matching_scaler() {
        let registry = GaugeRegistry::new();
        registry.set_gauge(labels("default", "orders", "fn-a"), 10.0);
        // Function renamed: the old series lingers until the scaler goes away.
        registry.set_gauge(labels("default", "orders", "fn-b"), 5.0);
        registry.set_gauge(labels("default", "billing", "fn-a"), 20.0);

        assert_eq!(registry.forget("default", "orders"), 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.forget("default", "orders"), 0);
    }

    #[test]
    fn snapshot_is_sorted() {
        let registry = GaugeRegistry::new();
        registry.set_gauge(labels("prod", "b", "fn"), 2.0);
        registry.set_gauge(labels("default", "z", "fn"), 1.0);
        registry.set_gauge(labels("prod", "a", "fn"), 3.0);

        let order: Vec<_> = registry
            .snapshot()
            .into_iter()
            .map(|(l, _)| format!("{}/{}", l.namespace, l.controller))
            .collect();
        assert_eq!(order, vec!["default/z", "prod/a", "prod/b"]);
    }

    #[tokio::test]
    async fn concurrent_writers_do_not_lose_series() {
        let registry = GaugeRegistry::new();
        let mut handles = Vec::new();
        for i in 0..32 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.set_gauge(labels("default", &format!("scaler-{i}"), "fn"), i as f64);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(registry.len(), 32);
        assert_eq!(registry.get(&labels("default", "scaler-7", "fn")), Some(7.0));
    }
}
