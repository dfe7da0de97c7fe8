//! rightsize-core — shared vocabulary for the rightsize controller.
//!
//! Defines the persisted scaler record, the collaborator traits the
//! reconciliation loop talks to, backlog sample averaging, and the
//! `rightsize.toml` configuration format.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod sample;
pub mod types;

pub use collaborators::*;
pub use config::RightsizeConfig;
pub use error::{CoreError, PlatformError};
pub use sample::{Sample, SampleWindow};
pub use types::*;
