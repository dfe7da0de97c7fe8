//! rightsize-platform — an in-memory function platform.
//!
//! `InMemoryPlatform` implements every platform-facing collaborator the
//! reconciliation loop needs (`PreconditionVerifier`, `BacklogSampler`,
//! `ConcurrencyApplier`). It is seeded from the `[platform]` section of
//! `rightsize.toml` for local runs, and used directly by tests, which can
//! inject failures and latency and count calls.

pub mod memory;

pub use memory::{CallCounts, InMemoryPlatform, Operation, queue_name_from_arn};
