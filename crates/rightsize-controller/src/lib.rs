//! rightsize-controller — backlog-driven reserved concurrency control.
//!
//! Each tick reads a scaler record, asks the gate whether an adjustment
//! may run, verifies the function and its queue trigger, samples the
//! queue backlog, and steps reserved concurrency up or down.
//!
//! # Adjustment Algorithm
//!
//! ```text
//! if avg_backlog > threshold:
//!     new = min(current + step, max)
//! else:
//!     new = max(current - step, min)
//! ```
//!
//! # State Machine
//!
//! ```text
//! (empty) → Pending → Adjusting → Adjusted
//!                  ↘            ↘
//!                   Error ←──────┘   (gate stays closed until reset)
//! ```
//!
//! A cooldown (5 minutes) separates successful adjustments, and every
//! record is re-ticked on a fixed cadence (5 minutes) whatever the outcome.

pub mod calculator;
pub mod error;
pub mod gate;
pub mod locks;
pub mod reconciler;
pub mod scheduler;

pub use calculator::{Decision, Direction, decide, next_concurrency};
pub use error::ReconcileError;
pub use gate::{COOLDOWN, allowed, allowed_with_cooldown};
pub use locks::KeyedLocks;
pub use reconciler::{
    Collaborators, ReconcileSettings, Reconciler, Requeue, TickOutcome, TickReport, TickSummary,
};
pub use scheduler::{DISCOVERY_INTERVAL, ScalerScheduler};
