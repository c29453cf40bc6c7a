//! Statistics for maintenance runs.

use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

/// Maintenance operation a run performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Backup,
    Synchronize,
    Rotate,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Backup => "backup",
            Operation::Synchronize => "synchronize",
            Operation::Rotate => "rotate",
        };
        f.write_str(name)
    }
}

/// What a run did to one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSummary {
    pub table: String,

    /// The table was created in the target store.
    pub created: bool,

    /// Nothing to do for this table.
    pub skipped: bool,

    /// Non-empty chunks copied.
    pub chunks_copied: usize,

    /// Records copied into the target.
    pub records_copied: usize,

    /// Days replaced by their homogenized version.
    pub days_rewritten: usize,

    /// Homogenized records written.
    pub records_written: usize,

    /// Raw records removed by rotation or trimming.
    pub records_removed: usize,

    /// The table was trimmed instead of resampled.
    pub trimmed: bool,
}

impl TableSummary {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn skipped(table: impl Into<String>) -> Self {
        Self {
            skipped: true,
            ..Self::new(table)
        }
    }
}

/// A table the run gave up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFailure {
    pub table: String,
    pub error: String,
}

/// Statistics from a maintenance run.
#[derive(Debug, Clone)]
pub struct RunStats {
    pub operation: Operation,

    /// Number of tables scanned.
    pub scanned_count: usize,

    /// Per-table outcome of every table that did not fail.
    pub tables: Vec<TableSummary>,

    /// Tables that failed, in processing order.
    pub errors: Vec<TableFailure>,

    /// Time taken for the run.
    pub duration: Duration,
}

impl RunStats {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            scanned_count: 0,
            tables: Vec::new(),
            errors: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn record(&mut self, summary: TableSummary) {
        self.tables.push(summary);
    }

    /// Record a table failure.
    pub fn record_error(&mut self, table: impl Into<String>, error: &Error) {
        self.errors.push(TableFailure {
            table: table.into(),
            error: error.to_string(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn failed_tables(&self) -> Vec<String> {
        self.errors.iter().map(|failure| failure.table.clone()).collect()
    }

    pub fn tables_created(&self) -> usize {
        self.tables.iter().filter(|t| t.created).count()
    }

    pub fn chunks_copied(&self) -> usize {
        self.tables.iter().map(|t| t.chunks_copied).sum()
    }

    pub fn records_copied(&self) -> usize {
        self.tables.iter().map(|t| t.records_copied).sum()
    }

    pub fn days_rewritten(&self) -> usize {
        self.tables.iter().map(|t| t.days_rewritten).sum()
    }

    pub fn records_written(&self) -> usize {
        self.tables.iter().map(|t| t.records_written).sum()
    }

    pub fn records_removed(&self) -> usize {
        self.tables.iter().map(|t| t.records_removed).sum()
    }

    pub fn tables_trimmed(&self) -> usize {
        self.tables.iter().filter(|t| t.trimmed).count()
    }

    /// Summary for the run, by operation.
    pub fn summary(&self) -> String {
        match self.operation {
            Operation::Backup | Operation::Synchronize => format!(
                "{}: Scanned: {}, Created: {}, Copied: {} records in {} chunks, Errors: {}, Duration: {:?}",
                self.operation,
                self.scanned_count,
                self.tables_created(),
                self.records_copied(),
                self.chunks_copied(),
                self.errors.len(),
                self.duration
            ),
            Operation::Rotate => format!(
                "{}: Scanned: {}, Rewritten: {} days ({} written, {} removed), Trimmed: {}, Errors: {}, Duration: {:?}",
                self.operation,
                self.scanned_count,
                self.days_rewritten(),
                self.records_written(),
                self.records_removed(),
                self.tables_trimmed(),
                self.errors.len(),
                self.duration
            ),
        }
    }

    /// Turn a run with failed tables into [`Error::TablesFailed`].
    pub fn ensure_success(self) -> Result<Self> {
        if self.has_errors() {
            return Err(Error::TablesFailed {
                operation: self.operation.to_string(),
                tables: self.failed_tables(),
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_stats_are_clean() {
        let stats = RunStats::new(Operation::Backup);
        assert_eq!(stats.scanned_count, 0);
        assert!(!stats.has_errors());
        assert_eq!(stats.records_copied(), 0);
        assert!(stats.ensure_success().is_ok());
    }

    #[test]
    fn totals_add_up_per_table() {
        let mut stats = RunStats::new(Operation::Rotate);
        stats.record(TableSummary {
            days_rewritten: 2,
            records_written: 192,
            records_removed: 2880,
            ..TableSummary::new("power")
        });
        stats.record(TableSummary {
            trimmed: true,
            records_removed: 10,
            ..TableSummary::new("raw_events")
        });
        stats.record(TableSummary::skipped("empty"));

        assert_eq!(stats.days_rewritten(), 2);
        assert_eq!(stats.records_removed(), 2890);
        assert_eq!(stats.tables_trimmed(), 1);

        let summary = stats.summary();
        assert!(summary.starts_with("rotate:"));
        assert!(summary.contains("Rewritten: 2 days (192 written, 2890 removed)"));
        assert!(summary.contains("Trimmed: 1"));
    }

    #[test]
    fn failures_become_tables_failed() {
        let mut stats = RunStats::new(Operation::Synchronize);
        stats.record_error("power", &Error::TableNotFound("power".to_string()));
        stats.record_error("energy", &Error::Corrupt("bad line".to_string()));
        assert!(stats.has_errors());
        assert!(stats.summary().contains("Errors: 2"));

        let err = stats.ensure_success().expect_err("failed tables");
        assert_eq!(
            err.to_string(),
            "synchronize failed for tables: power, energy"
        );
    }
}
