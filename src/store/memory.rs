use std::collections::BTreeMap;

use crate::core::Window;
use crate::error::{Error, Result};
use crate::store::{Record, RecordSet, Schema, TimeSeriesStore};

#[derive(Debug, Clone, Default)]
pub(crate) struct Table {
    pub(crate) schema: Schema,
    pub(crate) records: RecordSet,
}

/// In-memory store. Tables iterate in name order.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    name: String,
    tables: BTreeMap<String, Table>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: BTreeMap::new(),
        }
    }

    /// Create `table` if needed and upsert `records` into it.
    pub fn with_table(mut self, table: &str, schema: Schema, records: RecordSet) -> Self {
        let entry = self.tables.entry(table.to_string()).or_default();
        entry.schema = schema;
        entry.records.upsert(&records);
        self
    }

    /// Full content of `table`.
    pub fn records(&self, table: &str) -> Result<&RecordSet> {
        Ok(&self.table(table)?.records)
    }

    pub(crate) fn table(&self, table: &str) -> Result<&Table> {
        self.tables
            .get(table)
            .ok_or_else(|| Error::TableNotFound(table.to_string()))
    }

    pub(crate) fn table_mut(&mut self, table: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| Error::TableNotFound(table.to_string()))
    }

    pub(crate) fn insert_table(&mut self, name: String, table: Table) {
        self.tables.insert(name, table);
    }
}

impl TimeSeriesStore for MemoryStore {
    fn label(&self) -> String {
        self.name.clone()
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    fn contains_table(&self, table: &str) -> Result<bool> {
        Ok(self.tables.contains_key(table))
    }

    fn schema(&self, table: &str) -> Result<Schema> {
        Ok(self.table(table)?.schema)
    }

    fn create(&mut self, table: &str, schema: Schema) -> Result<()> {
        self.tables
            .entry(table.to_string())
            .or_insert_with(|| Table {
                schema,
                records: RecordSet::new(),
            });
        Ok(())
    }

    fn get_first(&self, table: &str) -> Result<Option<Record>> {
        Ok(self.table(table)?.records.first())
    }

    fn get_last(&self, table: &str) -> Result<Option<Record>> {
        Ok(self.table(table)?.records.last())
    }

    fn read(&self, table: &str, window: Window) -> Result<RecordSet> {
        Ok(self.table(table)?.records.range(window))
    }

    fn write(&mut self, table: &str, records: &RecordSet) -> Result<usize> {
        Ok(self.table_mut(table)?.records.upsert(records))
    }

    fn delete(&mut self, table: &str, window: Window) -> Result<usize> {
        Ok(self.table_mut(table)?.records.remove_window(window))
    }

    fn replace(&mut self, table: &str, window: Window, records: &RecordSet) -> Result<()> {
        let entry = self.table_mut(table)?;
        entry.records.remove_window(window);
        entry.records.upsert(records);
        Ok(())
    }
}
