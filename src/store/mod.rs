//! Time-series store abstraction.
//!
//! A store is a set of named tables, each an ordered sequence of
//! `(timestamp, value)` records with no duplicate timestamps. The engines only
//! talk to stores through [`TimeSeriesStore`]; two implementations ship with
//! the crate:
//!
//! - [`MemoryStore`]: tables held in memory, used for scratch work and tests
//! - [`DirStore`]: one JSON-lines file per table under a root directory
//!
//! Stores are opened from a [`StoreDescriptor`](crate::config::StoreDescriptor)
//! through a [`StoreConnector`].

mod connector;
mod dir;
mod memory;
mod record;

pub use connector::{DirConnector, StoreConnector};
pub use dir::DirStore;
pub use memory::MemoryStore;
pub use record::{DataType, Record, RecordSet, Schema};

use crate::core::Window;
use crate::error::Result;

/// Access to a collection of time-indexed tables.
pub trait TimeSeriesStore {
    /// Human readable label used in log lines and errors.
    fn label(&self) -> String;

    /// Names of all tables, sorted.
    fn list_tables(&self) -> Result<Vec<String>>;

    fn contains_table(&self, table: &str) -> Result<bool> {
        Ok(self.list_tables()?.iter().any(|name| name == table))
    }

    fn schema(&self, table: &str) -> Result<Schema>;

    /// Create an empty table. Creating an existing table is a no-op.
    fn create(&mut self, table: &str, schema: Schema) -> Result<()>;

    fn get_first(&self, table: &str) -> Result<Option<Record>>;

    fn get_last(&self, table: &str) -> Result<Option<Record>>;

    /// Records with timestamps in `window`, ordered.
    fn read(&self, table: &str, window: Window) -> Result<RecordSet>;

    /// Upsert `records` by timestamp. Returns the number of records written.
    fn write(&mut self, table: &str, records: &RecordSet) -> Result<usize>;

    /// Delete records in `window`. Returns the number of records removed.
    fn delete(&mut self, table: &str, window: Window) -> Result<usize>;

    /// Replace the content of `window` with `records`.
    ///
    /// The default writes the new records first and only then removes the raw
    /// timestamps they do not cover, so a failure in between leaves raw data
    /// readable. Stores that can swap a window atomically should override it.
    fn replace(&mut self, table: &str, window: Window, records: &RecordSet) -> Result<()> {
        let raw = self.read(table, window)?;
        self.write(table, records)?;
        for ts in raw.difference(records) {
            self.delete(table, Window::at(ts))?;
        }
        Ok(())
    }
}
