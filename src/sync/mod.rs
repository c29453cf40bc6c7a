//! Incremental mirroring between stores.
//!
//! The target's newest timestamp per table is the watermark: only source
//! records after it, up to the source's newest record or the current time
//! (whichever is earlier), are copied. Copies are made in calendar-month
//! chunks so a single table never has to be held in memory at once, and the
//! watermark only advances as far as the last committed chunk.

pub mod dump;

pub use dump::{DirDumpTool, DumpBridge, DumpTool, MysqlClient, ScratchDatabase};

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};

use crate::core::{slice_range, CancelToken, Clock, Frequency, SystemClock, Window, TICK};
use crate::error::{Error, Result};
use crate::lifecycle::{Operation, RunStats, TableSummary};
use crate::store::TimeSeriesStore;

/// Copies new records of every source table into a target store.
pub struct SyncEngine {
    clock: Arc<dyn Clock>,
    cancel: CancelToken,
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncEngine {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Mirror every table of `source` into `target`.
    ///
    /// Missing target tables are created with the source schema. A failing
    /// table is logged and recorded in the returned stats; the remaining
    /// tables are still processed. Cancellation aborts the run.
    pub fn synchronize(
        &self,
        source: &dyn TimeSeriesStore,
        target: &mut dyn TimeSeriesStore,
    ) -> Result<RunStats> {
        self.run(Operation::Backup, source, target)
    }

    pub(crate) fn run(
        &self,
        operation: Operation,
        source: &dyn TimeSeriesStore,
        target: &mut dyn TimeSeriesStore,
    ) -> Result<RunStats> {
        let start = Instant::now();
        let mut stats = RunStats::new(operation);

        let tables = source.list_tables()?;
        stats.scanned_count = tables.len();

        for table in tables {
            self.cancel.check()?;
            match self.sync_table(source, target, &table) {
                Ok(summary) => stats.record(summary),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(err) => {
                    let err = Error::for_table(&table, err);
                    warn!(
                        "Copying from {} to {} failed: {err}",
                        source.label(),
                        target.label()
                    );
                    stats.record_error(&table, &err);
                }
            }
        }

        stats.duration = start.elapsed();
        Ok(stats)
    }

    /// The closed range of source timestamps still missing from `target`,
    /// or `None` when the target is up to date.
    ///
    /// The range ends at `min(source last, now)` inclusive, so every source
    /// record after the watermark and not after that bound is copied. A
    /// single record one `TICK` after the watermark is therefore still
    /// pending; only `start > end` means there is nothing to do.
    pub fn pending_window(
        &self,
        source: &dyn TimeSeriesStore,
        target: &dyn TimeSeriesStore,
        table: &str,
    ) -> Result<Option<Window>> {
        let sync_end = match source.get_last(table)? {
            Some(last) => last.timestamp.min(self.clock.now()),
            None => return Ok(None),
        };

        let watermark = if target.contains_table(table)? {
            target.get_last(table)?
        } else {
            None
        };
        let sync_start = match watermark {
            Some(last) => last.timestamp + TICK,
            None => match source.get_first(table)? {
                Some(first) => first.timestamp,
                None => return Ok(None),
            },
        };

        if sync_start > sync_end {
            return Ok(None);
        }
        Ok(Some(Window::closed(sync_start, sync_end)))
    }

    /// Bring one table of `target` up to date with `source`.
    pub fn sync_table(
        &self,
        source: &dyn TimeSeriesStore,
        target: &mut dyn TimeSeriesStore,
        table: &str,
    ) -> Result<TableSummary> {
        let mut summary = TableSummary::new(table);

        if !target.contains_table(table)? {
            target.create(table, source.schema(table)?)?;
            summary.created = true;
            info!("Created table {table} in {}", target.label());
        }

        let window = match self.pending_window(source, &*target, table)? {
            Some(window) => window,
            None => {
                debug!("Skip copying table {table}, no new values found");
                summary.skipped = true;
                return Ok(summary);
            }
        };

        for chunk in slice_range(window.start, window.end, Frequency::Month) {
            self.cancel.check()?;
            let records = source.read(table, chunk)?;
            if records.is_empty() {
                continue;
            }
            info!(
                "Copying {} values of table {table} from {chunk}",
                records.len()
            );
            summary.records_copied += target.write(table, &records)?;
            summary.chunks_copied += 1;
        }

        summary.skipped = summary.chunks_copied == 0;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FixedClock;
    use crate::store::{MemoryStore, Record, RecordSet, Schema};
    use time::macros::datetime;
    use time::{Duration, OffsetDateTime};

    fn daily(start: OffsetDateTime, days: i64) -> RecordSet {
        (0..days)
            .map(|i| Record::new(start + Duration::days(i), i as f64))
            .collect()
    }

    fn engine(now: OffsetDateTime) -> SyncEngine {
        SyncEngine::new().with_clock(Arc::new(FixedClock(now)))
    }

    #[test]
    fn pending_window_starts_after_watermark() {
        let source =
            MemoryStore::new("src").with_table("t", Schema::default(), daily(datetime!(2024-01-01 00:00 UTC), 10));
        let target =
            MemoryStore::new("dst").with_table("t", Schema::default(), daily(datetime!(2024-01-01 00:00 UTC), 4));

        let window = engine(datetime!(2024-06-01 00:00 UTC))
            .pending_window(&source, &target, "t")
            .expect("window")
            .expect("pending");
        assert_eq!(window.start, datetime!(2024-01-04 00:00:01 UTC));
        assert!(window.contains(datetime!(2024-01-10 00:00 UTC)));
        assert!(!window.contains(datetime!(2024-01-10 00:00:00.001 UTC)));
    }

    #[test]
    fn pending_window_is_capped_at_now() {
        let source =
            MemoryStore::new("src").with_table("t", Schema::default(), daily(datetime!(2024-01-01 00:00 UTC), 10));
        let target = MemoryStore::new("dst");
        let window = engine(datetime!(2024-01-05 12:00 UTC))
            .pending_window(&source, &target, "t")
            .expect("window")
            .expect("pending");
        assert_eq!(window.start, datetime!(2024-01-01 00:00 UTC));
        assert!(window.contains(datetime!(2024-01-05 12:00 UTC)));
        assert!(!window.contains(datetime!(2024-01-06 00:00 UTC)));
    }

    #[test]
    fn up_to_date_target_has_nothing_pending() {
        let records = daily(datetime!(2024-01-01 00:00 UTC), 3);
        let source = MemoryStore::new("src").with_table("t", Schema::default(), records.clone());
        let target = MemoryStore::new("dst").with_table("t", Schema::default(), records);
        let pending = engine(datetime!(2024-06-01 00:00 UTC))
            .pending_window(&source, &target, "t")
            .expect("window");
        assert!(pending.is_none());
    }

    #[test]
    fn copies_in_month_chunks_and_creates_tables() {
        let source = MemoryStore::new("src").with_table(
            "t",
            Schema::default(),
            daily(datetime!(2024-01-15 00:00 UTC), 60),
        );
        let mut target = MemoryStore::new("dst");
        let stats = engine(datetime!(2024-06-01 00:00 UTC))
            .synchronize(&source, &mut target)
            .expect("sync");

        assert_eq!(stats.tables_created(), 1);
        assert_eq!(stats.records_copied(), 60);
        // January, February, March
        assert_eq!(stats.chunks_copied(), 3);
        assert_eq!(
            target.records("t").expect("records"),
            source.records("t").expect("records")
        );
    }

    #[test]
    fn cancellation_aborts() {
        let source = MemoryStore::new("src").with_table(
            "t",
            Schema::default(),
            daily(datetime!(2024-01-01 00:00 UTC), 3),
        );
        let mut target = MemoryStore::new("dst");
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = engine(datetime!(2024-06-01 00:00 UTC))
            .with_cancel_token(cancel)
            .synchronize(&source, &mut target);
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(target.list_tables().expect("list").is_empty());
    }
}
