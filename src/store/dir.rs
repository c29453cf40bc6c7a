//! Directory-backed store.
//!
//! Each table lives in `<root>/<table>.jsonl`: a schema header line followed
//! by one `{"ts": <unix nanos>, "value": <f64|null>}` line per record, in
//! timestamp order. Every mutation stages the new table content, writes it to
//! a temporary file and renames it over the old one, so readers see either
//! the previous or the next version of a table, never a mix.
//!
//! Tables are loaded completely when the store is opened, and every mutation
//! rewrites and fsyncs the whole table file. Chunked copies therefore bound
//! the size of each read, but not the memory or I/O this store spends per
//! chunk. It suits stores of moderate size; large deployments should use a
//! backend with range-indexed storage.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::core::Window;
use crate::error::{Error, Result};
use crate::store::memory::{MemoryStore, Table};
use crate::store::{Record, RecordSet, Schema, TimeSeriesStore};

const TABLE_EXT: &str = "jsonl";

#[derive(Debug, Serialize, Deserialize)]
struct Line {
    ts: i64,
    value: Option<f64>,
}

#[derive(Debug)]
pub struct DirStore {
    root: PathBuf,
    inner: MemoryStore,
}

impl DirStore {
    /// Open an existing store directory and load its tables.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("store directory {} does not exist", root.display()),
            )));
        }

        let mut inner = MemoryStore::new(root.display().to_string());
        for entry in std::fs::read_dir(&root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(TABLE_EXT) {
                continue;
            }
            let name = match path.file_stem().and_then(|stem| stem.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            let table = load_table(&path)?;
            inner.insert_table(name, table);
        }

        Ok(Self { root, inner })
    }

    /// Create the store directory if needed, then open it.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Self::open(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.root.join(format!("{table}.{TABLE_EXT}"))
    }

    /// Apply `change` to a copy of `table`, persist it, then publish it.
    fn update<R>(&mut self, table: &str, change: impl FnOnce(&mut Table) -> R) -> Result<R> {
        let mut staged = self.inner.table(table)?.clone();
        let out = change(&mut staged);
        store_table(&self.table_path(table), &staged)?;
        self.inner.insert_table(table.to_string(), staged);
        Ok(out)
    }
}

impl TimeSeriesStore for DirStore {
    fn label(&self) -> String {
        self.root.display().to_string()
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        self.inner.list_tables()
    }

    fn contains_table(&self, table: &str) -> Result<bool> {
        self.inner.contains_table(table)
    }

    fn schema(&self, table: &str) -> Result<Schema> {
        self.inner.schema(table)
    }

    fn create(&mut self, table: &str, schema: Schema) -> Result<()> {
        validate_table_name(table)?;
        if self.inner.contains_table(table)? {
            return Ok(());
        }
        let created = Table {
            schema,
            records: RecordSet::new(),
        };
        store_table(&self.table_path(table), &created)?;
        self.inner.insert_table(table.to_string(), created);
        Ok(())
    }

    fn get_first(&self, table: &str) -> Result<Option<Record>> {
        self.inner.get_first(table)
    }

    fn get_last(&self, table: &str) -> Result<Option<Record>> {
        self.inner.get_last(table)
    }

    fn read(&self, table: &str, window: Window) -> Result<RecordSet> {
        self.inner.read(table, window)
    }

    fn write(&mut self, table: &str, records: &RecordSet) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        self.update(table, |staged| staged.records.upsert(records))
    }

    fn delete(&mut self, table: &str, window: Window) -> Result<usize> {
        if self.inner.read(table, window)?.is_empty() {
            return Ok(0);
        }
        self.update(table, |staged| staged.records.remove_window(window))
    }

    fn replace(&mut self, table: &str, window: Window, records: &RecordSet) -> Result<()> {
        self.update(table, |staged| {
            staged.records.remove_window(window);
            staged.records.upsert(records);
        })
    }
}

fn validate_table_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidTable(name.to_string()))
    }
}

fn load_table(path: &Path) -> Result<Table> {
    let file = File::open(path)?;
    let mut lines = BufReader::new(file).lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => return Err(Error::Corrupt(format!("{}: missing header", path.display()))),
    };
    let schema: Schema = serde_json::from_str(&header)
        .map_err(|err| Error::Corrupt(format!("{}: header: {err}", path.display())))?;

    let mut records = RecordSet::new();
    for (idx, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: Line = serde_json::from_str(&line)
            .map_err(|err| Error::Corrupt(format!("{}:{}: {err}", path.display(), idx + 2)))?;
        let ts = OffsetDateTime::from_unix_timestamp_nanos(i128::from(parsed.ts))
            .map_err(|err| Error::Corrupt(format!("{}:{}: {err}", path.display(), idx + 2)))?;
        records.insert(ts, parsed.value.unwrap_or(f64::NAN));
    }

    Ok(Table { schema, records })
}

fn store_table(path: &Path, table: &Table) -> Result<()> {
    let tmp = tmp_path_for(path)?;
    let _ = std::fs::remove_file(&tmp);

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer(&mut out, &table.schema)?;
    out.write_all(b"\n")?;
    for record in table.records.iter() {
        let ts = i64::try_from(record.timestamp.unix_timestamp_nanos()).map_err(|_| {
            Error::Corrupt(format!("timestamp {} out of range", record.timestamp))
        })?;
        let value = record.value.is_finite().then_some(record.value);
        serde_json::to_writer(&mut out, &Line { ts, value })?;
        out.write_all(b"\n")?;
    }
    let file = out.into_inner().map_err(|err| Error::Io(err.into_error()))?;
    file.sync_all()?;

    std::fs::rename(&tmp, path)?;
    if let Some(parent) = path.parent() {
        fsync_dir(parent)?;
    }
    Ok(())
}

fn tmp_path_for(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| Error::Corrupt(format!("missing filename for {}", path.display())))?
        .to_string_lossy();
    Ok(path.with_file_name(format!("{name}.tmp")))
}

fn fsync_dir(path: &Path) -> Result<()> {
    let dir = File::open(path)?;
    dir.sync_all()?;
    Ok(())
}
