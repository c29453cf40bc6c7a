use std::sync::Arc;

use anyhow::Result;
use tempfile::tempdir;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

use tsmaint::config::RotationConfig;
use tsmaint::core::{FixedClock, Window, TICK};
use tsmaint::rotate::{find_gaps, resample_day, ResampleMethod, TableSelection};
use tsmaint::store::{DataType, Record, RecordSet, Schema};
use tsmaint::{DirStore, Error, MemoryStore, RotationEngine, TimeSeriesStore};

const NOW: OffsetDateTime = datetime!(2024-03-01 12:00 UTC);

fn series(start: OffsetDateTime, step: Duration, count: i64) -> RecordSet {
    (0..count)
        .map(|i| {
            let value = (i as f64 / 10.0).sin() * 100.0;
            Record::new(start + step * i as i32, value)
        })
        .collect()
}

fn engine(config: RotationConfig) -> RotationEngine {
    RotationEngine::new(config)
        .expect("valid rotation config")
        .with_clock(Arc::new(FixedClock(NOW)))
}

fn day(date: OffsetDateTime) -> Window {
    Window::new(date, date + Duration::DAY)
}

#[test]
fn hourly_day_with_one_missing_sample_is_kept() -> Result<()> {
    let mut raw = series(datetime!(2024-01-01 00:00 UTC), Duration::HOUR, 30);
    raw.remove(&datetime!(2024-01-01 02:00 UTC));
    let mut store = MemoryStore::new("primary").with_table("power", Schema::default(), raw.clone());

    let stats = engine(RotationConfig::new(Duration::days(30), 60.0)).rotate(&mut store, true)?;

    assert_eq!(stats.days_rewritten(), 0);
    assert_eq!(store.records("power")?, &raw);

    let morning = raw.range(Window::closed(
        datetime!(2024-01-01 00:00 UTC),
        datetime!(2024-01-01 05:00 UTC),
    ));
    assert_eq!(morning.len(), 5);
    let grid = resample_day(&morning, Duration::HOUR, ResampleMethod::Interpolate, DataType::Float);
    assert_eq!(grid.len(), 5);
    assert!(!grid.contains(&datetime!(2024-01-01 02:00 UTC)));
    assert_eq!(grid.difference(&morning).count(), 0);
    Ok(())
}

#[test]
fn outage_is_not_filled_with_interpolated_values() -> Result<()> {
    let start = datetime!(2024-01-01 00:00:20 UTC);
    let mut raw = series(start, Duration::MINUTE, 3 * 24 * 60);
    let outage = Window::new(datetime!(2024-01-02 06:00 UTC), datetime!(2024-01-02 10:00 UTC));
    raw.retain(|ts, _| !outage.contains(*ts));
    let mut store = MemoryStore::new("primary").with_table("power", Schema::default(), raw.clone());

    let resolution = Duration::minutes(15);
    let stats = engine(RotationConfig::new(Duration::days(30), 15.0)).rotate(&mut store, true)?;
    // 2024-01-02 is the only complete day
    assert_eq!(stats.days_rewritten(), 1);

    let rotated = store.read("power", day(datetime!(2024-01-02 00:00 UTC)))?;
    assert!(rotated.len() < 96);
    let gaps = find_gaps(&raw.range(day(datetime!(2024-01-02 00:00 UTC))), resolution);
    assert_eq!(gaps.len(), 1);
    for gap in &gaps {
        let lower = gap.start + resolution - TICK;
        assert!(rotated.timestamps().all(|ts| !(ts > lower && ts < gap.end)));
    }
    // last sample before the outage is 05:59:20, first after it 10:00:20
    assert!(rotated.contains(&datetime!(2024-01-02 06:00 UTC)));
    assert!(!rotated.contains(&datetime!(2024-01-02 06:15 UTC)));
    assert!(!rotated.contains(&datetime!(2024-01-02 10:00 UTC)));
    assert!(rotated.contains(&datetime!(2024-01-02 10:15 UTC)));
    Ok(())
}

#[test]
fn full_rotation_is_idempotent() -> Result<()> {
    let temp = tempdir()?;
    {
        let mut store = DirStore::create(temp.path())?;
        store.create("power", Schema::default())?;
        store.write(
            "power",
            &series(datetime!(2024-01-01 00:00:30 UTC), Duration::seconds(90), 5 * 24 * 40),
        )?;
    }

    let engine = engine(RotationConfig::new(Duration::days(30), 15.0));
    let mut store = DirStore::open(temp.path())?;
    let first = engine.rotate(&mut store, true)?;
    assert!(first.days_rewritten() > 0);
    let after_first = store.read("power", Window::new(datetime!(2023-01-01 00:00 UTC), NOW))?;

    let mut reopened = DirStore::open(temp.path())?;
    let second = engine.rotate(&mut reopened, true)?;
    assert_eq!(second.days_rewritten(), 0);
    assert_eq!(
        reopened.read("power", Window::new(datetime!(2023-01-01 00:00 UTC), NOW))?,
        after_first
    );
    Ok(())
}

#[test]
fn trimmed_table_loses_everything_before_cutoff() -> Result<()> {
    let raw = series(datetime!(2024-01-01 00:00 UTC), Duration::HOUR, 60 * 24);
    let mut store = MemoryStore::new("primary")
        .with_table("raw_events", Schema::default(), raw.clone())
        .with_table("power", Schema::default(), raw.clone());

    let config = RotationConfig::new(Duration::days(30), 15.0)
        .with_tables_to_trim(TableSelection::from_names(["raw_events"]));
    let engine = engine(config);
    let cutoff = engine.cutoff()?;
    assert_eq!(cutoff, datetime!(2024-01-31 00:00 UTC));

    let stats = engine.rotate(&mut store, false)?;
    assert_eq!(stats.tables_trimmed(), 1);

    let trimmed = store.records("raw_events")?;
    assert!(trimmed.iter().all(|record| record.timestamp > cutoff));
    assert_eq!(
        trimmed.len(),
        raw.iter().filter(|record| record.timestamp > cutoff).count()
    );
    let summary = stats
        .tables
        .iter()
        .find(|table| table.table == "raw_events")
        .expect("raw_events summary");
    assert_eq!(summary.records_written, 0);
    Ok(())
}

#[test]
fn process_all_days_matches_full_run() -> Result<()> {
    let raw = series(datetime!(2024-01-01 00:00:10 UTC), Duration::MINUTE, 4 * 24 * 60);
    let mut incremental = MemoryStore::new("a").with_table("power", Schema::default(), raw.clone());
    let mut configured = MemoryStore::new("b").with_table("power", Schema::default(), raw);

    let stats = engine(RotationConfig::new(Duration::days(30), 15.0)).rotate(&mut incremental, true)?;
    let config = RotationConfig::new(Duration::days(30), 15.0).with_process_all_days(true);
    let configured_stats = engine(config).rotate(&mut configured, false)?;

    assert_eq!(stats.days_rewritten(), configured_stats.days_rewritten());
    assert_eq!(incremental.records("power")?, configured.records("power")?);
    Ok(())
}

#[test]
fn incremental_runs_walk_backwards_one_day_at_a_time() -> Result<()> {
    let raw = series(datetime!(2023-12-31 23:59:10 UTC), Duration::MINUTE, 2 * 24 * 60 + 2);
    let mut store = MemoryStore::new("primary").with_table("power", Schema::default(), raw);
    let engine = engine(RotationConfig::new(Duration::days(30), 15.0));

    let newest = day(datetime!(2024-01-02 00:00 UTC));
    let oldest = day(datetime!(2024-01-01 00:00 UTC));

    assert_eq!(engine.rotate(&mut store, false)?.days_rewritten(), 1);
    assert!(store.read("power", newest)?.len() < 100);
    assert_eq!(store.read("power", oldest)?.len(), 24 * 60);

    assert_eq!(engine.rotate(&mut store, false)?.days_rewritten(), 1);
    assert!(store.read("power", oldest)?.len() < 100);

    assert_eq!(engine.rotate(&mut store, false)?.days_rewritten(), 0);
    Ok(())
}

#[test]
fn boolean_tables_stay_boolean() -> Result<()> {
    let raw: RecordSet = (0..24 * 60 + 5)
        .map(|i| {
            Record::new(
                datetime!(2023-12-31 23:58:40 UTC) + Duration::minutes(i),
                if (i / 7) % 2 == 0 { 0.0 } else { 1.0 },
            )
        })
        .collect();
    let mut store = MemoryStore::new("primary").with_table("pump", Schema::new(DataType::Boolean), raw);

    let stats = engine(RotationConfig::new(Duration::days(30), 10.0)).rotate(&mut store, true)?;
    assert_eq!(stats.days_rewritten(), 1);
    assert!(store
        .records("pump")?
        .iter()
        .all(|record| record.value == 0.0 || record.value == 1.0));
    Ok(())
}

#[test]
fn max_resampling_keeps_peaks() -> Result<()> {
    let mut raw = series(datetime!(2023-12-31 23:59:30 UTC), Duration::MINUTE, 24 * 60 + 2);
    raw.insert(datetime!(2024-01-01 12:07:30 UTC), 1000.0);
    let mut store = MemoryStore::new("primary").with_table("power", Schema::default(), raw);

    let mut config = RotationConfig::new(Duration::days(30), 15.0);
    config.resample_by_max = TableSelection::All;
    let stats = engine(config).rotate(&mut store, true)?;

    assert_eq!(stats.days_rewritten(), 1);
    assert_eq!(
        store.records("power")?.get(&datetime!(2024-01-01 12:15 UTC)),
        Some(1000.0)
    );
    Ok(())
}

/// Wraps a store and fails reads or writes of one table.
struct FailingTable {
    inner: MemoryStore,
    table: &'static str,
    fail_reads: bool,
}

impl TimeSeriesStore for FailingTable {
    fn label(&self) -> String {
        self.inner.label()
    }
    fn list_tables(&self) -> tsmaint::Result<Vec<String>> {
        self.inner.list_tables()
    }
    fn schema(&self, table: &str) -> tsmaint::Result<Schema> {
        self.inner.schema(table)
    }
    fn create(&mut self, table: &str, schema: Schema) -> tsmaint::Result<()> {
        self.inner.create(table, schema)
    }
    fn get_first(&self, table: &str) -> tsmaint::Result<Option<Record>> {
        self.inner.get_first(table)
    }
    fn get_last(&self, table: &str) -> tsmaint::Result<Option<Record>> {
        self.inner.get_last(table)
    }
    fn read(&self, table: &str, window: Window) -> tsmaint::Result<RecordSet> {
        if self.fail_reads && table == self.table {
            return Err(Error::Corrupt(format!("{table} is unreadable")));
        }
        self.inner.read(table, window)
    }
    fn write(&mut self, table: &str, records: &RecordSet) -> tsmaint::Result<usize> {
        if !self.fail_reads && table == self.table {
            return Err(Error::Io(std::io::Error::other("disk full")));
        }
        self.inner.write(table, records)
    }
    fn delete(&mut self, table: &str, window: Window) -> tsmaint::Result<usize> {
        self.inner.delete(table, window)
    }
}

fn one_full_day() -> RecordSet {
    series(datetime!(2023-12-31 23:59:30 UTC), Duration::MINUTE, 24 * 60 + 2)
}

#[test]
fn failing_table_does_not_stop_rotation() -> Result<()> {
    let raw = one_full_day();
    let mut store = FailingTable {
        inner: MemoryStore::new("primary")
            .with_table("a_power", Schema::default(), raw.clone())
            .with_table("b_broken", Schema::default(), raw.clone())
            .with_table("c_energy", Schema::default(), raw.clone()),
        table: "b_broken",
        fail_reads: true,
    };

    let stats = engine(RotationConfig::new(Duration::days(30), 15.0)).rotate(&mut store, true)?;
    assert_eq!(stats.scanned_count, 3);
    assert_eq!(stats.failed_tables(), vec!["b_broken".to_string()]);
    assert_eq!(stats.days_rewritten(), 2);
    assert!(store.inner.records("a_power")?.len() < 100);
    assert!(store.inner.records("c_energy")?.len() < 100);
    assert_eq!(store.inner.records("b_broken")?, &raw);
    Ok(())
}

#[test]
fn failed_homogenized_write_keeps_raw_day() -> Result<()> {
    let raw = one_full_day();
    let mut store = FailingTable {
        inner: MemoryStore::new("primary").with_table("power", Schema::default(), raw.clone()),
        table: "power",
        fail_reads: false,
    };

    let stats = engine(RotationConfig::new(Duration::days(30), 15.0)).rotate(&mut store, true)?;
    assert_eq!(stats.failed_tables(), vec!["power".to_string()]);
    assert_eq!(stats.days_rewritten(), 0);
    assert_eq!(store.inner.records("power")?, &raw);
    Ok(())
}
