//! Rotation of aged data.
//!
//! Raw samples older than the retention period are either deleted (trimmed
//! tables) or replaced, one UTC day at a time, by values resampled onto a
//! regular grid. Days are processed newest first. Unless a full run is
//! requested, a table stops after its first rewritten day, so repeated runs
//! work backwards through history one day per table per run.

mod gaps;
mod homogenize;
mod policy;

pub use gaps::{find_gaps, strip_gaps, Gap};
pub use homogenize::homogenize;
pub use policy::{resample_method, should_trim, ResampleMethod, TableSelection};

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use time::{Duration, OffsetDateTime};

use crate::config::RotationConfig;
use crate::core::{floor_day, slice_range, CancelToken, Clock, Frequency, SystemClock, Window};
use crate::error::{Error, Result};
use crate::lifecycle::{Operation, RunStats, TableSummary};
use crate::store::{DataType, RecordSet, TimeSeriesStore};

/// Homogenize one day of raw data and drop grid points inside raw gaps.
pub fn resample_day(
    raw: &RecordSet,
    resolution: Duration,
    method: ResampleMethod,
    data_type: DataType,
) -> RecordSet {
    let mut grid = homogenize(raw, resolution, method, data_type);
    let gaps = find_gaps(raw, resolution);
    let stripped = strip_gaps(&mut grid, &gaps, resolution);
    if stripped > 0 {
        debug!(
            "Dropped {stripped} grid points inside {} gaps",
            gaps.len()
        );
    }
    grid
}

/// Whether replacing `raw` by `homogenized` is worth it.
///
/// The homogenized day must not hold more records than the raw day, and more
/// than one of its timestamps must be new. Data already on the grid therefore
/// stays untouched, which makes rotation idempotent.
pub fn should_commit(raw: &RecordSet, homogenized: &RecordSet) -> bool {
    if homogenized.is_empty() || homogenized.len() > raw.len() {
        return false;
    }
    homogenized.difference(raw).nth(1).is_some()
}

/// Applies a [`RotationConfig`] to a store.
pub struct RotationEngine {
    config: RotationConfig,
    resolution: Duration,
    clock: Arc<dyn Clock>,
    cancel: CancelToken,
}

impl RotationEngine {
    /// Create an engine, rejecting an unusable configuration.
    pub fn new(config: RotationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            resolution: config.resolution()?,
            config,
            clock: Arc::new(SystemClock),
            cancel: CancelToken::new(),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &RotationConfig {
        &self.config
    }

    /// Midnight of the day holding `now - retention_period`; nothing at or
    /// after it is rotated.
    pub fn cutoff(&self) -> Result<OffsetDateTime> {
        self.clock
            .now()
            .checked_sub(self.config.retention_period)
            .map(floor_day)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "rotation retention_period of {} days reaches before the supported date range",
                    self.config.retention_period.whole_days()
                ))
            })
    }

    /// Rotate every table of `store`.
    ///
    /// `full` rewrites every eligible day instead of only the newest one, as
    /// does `process_all_days` in the configuration. A failing table is logged
    /// and recorded in the returned stats; the remaining tables are still
    /// processed. Cancellation aborts the run.
    pub fn rotate(&self, store: &mut dyn TimeSeriesStore, full: bool) -> Result<RunStats> {
        let start = Instant::now();
        let mut stats = RunStats::new(Operation::Rotate);
        let full = full || self.config.process_all_days;
        let cutoff = self.cutoff()?;

        let tables = store.list_tables()?;
        stats.scanned_count = tables.len();

        for table in tables {
            self.cancel.check()?;
            match self.rotate_table(store, &table, cutoff, full) {
                Ok(summary) => stats.record(summary),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(err) => {
                    let err = Error::for_table(&table, err);
                    warn!("Rotation in {} failed: {err}", store.label());
                    stats.record_error(&table, &err);
                }
            }
        }

        stats.duration = start.elapsed();
        Ok(stats)
    }

    /// Rotate one table against `cutoff`.
    pub fn rotate_table(
        &self,
        store: &mut dyn TimeSeriesStore,
        table: &str,
        cutoff: OffsetDateTime,
        full: bool,
    ) -> Result<TableSummary> {
        let (first, last) = match (store.get_first(table)?, store.get_last(table)?) {
            (Some(first), Some(last)) => (first.timestamp, last.timestamp),
            _ => {
                debug!("Skip rotating empty table {table}");
                return Ok(TableSummary::skipped(table));
            }
        };

        let rotate_start = first;
        let rotate_end = last.min(cutoff);
        if rotate_end - rotate_start < Duration::DAY {
            debug!("Skip rotating table {table}, less than a day of aged values");
            return Ok(TableSummary::skipped(table));
        }

        let mut summary = TableSummary::new(table);
        if should_trim(&self.config, table) {
            let window = Window::closed(rotate_start, rotate_end);
            summary.records_removed = store.delete(table, window)?;
            summary.trimmed = true;
            info!(
                "Trimmed {} values of table {table} from {window}",
                summary.records_removed
            );
            return Ok(summary);
        }

        let method = resample_method(&self.config, table);
        let data_type = store.schema(table)?.data_type;
        let resolution = self.resolution;

        for day in slice_range(rotate_start, rotate_end, Frequency::Day).into_iter().rev() {
            if day.duration() < Duration::DAY {
                continue;
            }
            self.cancel.check()?;

            let raw = store.read(table, day)?;
            if raw.is_empty() {
                continue;
            }
            let homogenized = resample_day(&raw, resolution, method, data_type);
            if !should_commit(&raw, &homogenized) {
                debug!("Values of table {table} from {day} are already homogeneous");
                continue;
            }

            info!(
                "Rotating {} values of table {table} from {day} into {} homogenized values",
                raw.len(),
                homogenized.len()
            );
            store.replace(table, day, &homogenized)?;
            summary.days_rewritten += 1;
            summary.records_written += homogenized.len();
            summary.records_removed += raw.len();

            if !full {
                break;
            }
        }

        summary.skipped = summary.days_rewritten == 0;
        Ok(summary)
    }
}
