//! Maintenance of time-series stores.
//!
//! Two engines work on any [`TimeSeriesStore`]:
//!
//! - [`SyncEngine`] mirrors tables incrementally from one store into another,
//!   using the newest target timestamp as a watermark
//! - [`RotationEngine`] trims aged data or resamples it onto a regular grid,
//!   one day at a time, without inventing values inside outages
//!
//! [`MaintenanceManager`] ties both to a configuration and a primary store.

pub mod config;
pub mod core;
pub mod error;
pub mod lifecycle;
pub mod rotate;
pub mod store;
pub mod sync;

pub use config::MaintenanceConfig;
pub use error::{Error, Result};
pub use lifecycle::{MaintenanceManager, RunStats};
pub use rotate::RotationEngine;
pub use store::{DirStore, MemoryStore, TimeSeriesStore};
pub use sync::SyncEngine;
