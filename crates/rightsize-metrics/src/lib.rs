//! rightsize-metrics — observability for rightsize scalers.
//!
//! Holds the process-wide concurrency gauge that every reconciliation
//! tick writes to, and renders it as Prometheus text.
//!
//! # Architecture
//!
//! ```text
//! GaugeRegistry (Clone, shared by all ticks)
//!   ├── set_gauge()  ← called by the reconciler after each adjustment
//!   ├── forget()     ← called when a scaler record is deleted
//!   └── snapshot()   → sorted (labels, value) pairs
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for /metrics endpoint
//! ```

pub mod prometheus;
pub mod registry;

pub use prometheus::render_prometheus;
pub use registry::GaugeRegistry;
