//! Maintenance lifecycle.
//!
//! [`MaintenanceManager`] is the command surface of the crate. It owns the
//! primary store and the configuration and runs one operation per call:
//!
//! - `run_backup`: mirror the primary store into the backup target
//! - `run_synchronize`: merge a dump into the primary store, restored by the
//!   dump tool matching the store connector
//! - `run_rotate(full)`: trim or homogenize aged data
//!
//! Every run returns [`RunStats`]. Per-table failures do not abort a run;
//! they are collected in the stats and turned into an error by
//! [`RunStats::ensure_success`].
//!
//! # Example
//!
//! ```rust,ignore
//! use tsmaint::config::MaintenanceConfig;
//! use tsmaint::lifecycle::MaintenanceManager;
//! use tsmaint::store::DirConnector;
//!
//! let config = MaintenanceConfig::load("/etc/tsmaint/site.json")?;
//! let mut manager = MaintenanceManager::open(config, Box::new(DirConnector::new("/var/lib/tsmaint")))?;
//!
//! let stats = manager.run_rotate(false)?.ensure_success()?;
//! println!("Rewrote {} days", stats.days_rewritten());
//! ```

mod manager;
mod stats;

pub use manager::MaintenanceManager;
pub use stats::{Operation, RunStats, TableFailure, TableSummary};
