//! rightsize-state — embedded record store for rightsize.
//!
//! Backed by [redb](https://docs.rs/redb), holds one JSON-serialized
//! `ScalerRecord` per `{namespace}/{name}` key. The `StateStore` is
//! `Clone` + `Send` + `Sync` (backed by `Arc<Database>`) and implements
//! `RecordStore` so the reconciliation loop can share it across tasks.

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use store::StateStore;
