use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};

use crate::core::Window;

/// Value type carried by a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    Float,
    Integer,
    Boolean,
}

impl DataType {
    /// Coerce a derived value into something this type can hold.
    pub fn normalize(self, value: f64) -> f64 {
        match self {
            DataType::Float => value,
            DataType::Integer => value.round(),
            DataType::Boolean => {
                if value >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Table schema used when a mirror table has to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub data_type: DataType,
}

impl Schema {
    pub fn new(data_type: DataType) -> Self {
        Self { data_type }
    }
}

/// One sampled value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    pub timestamp: OffsetDateTime,
    pub value: f64,
}

impl Record {
    pub fn new(timestamp: OffsetDateTime, value: f64) -> Self {
        Self {
            timestamp: timestamp.to_offset(UtcOffset::UTC),
            value,
        }
    }
}

/// Ordered, timestamp-indexed set of records. Inserting an existing
/// timestamp overwrites its value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    entries: BTreeMap<OffsetDateTime, f64>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, timestamp: OffsetDateTime, value: f64) -> Option<f64> {
        self.entries
            .insert(timestamp.to_offset(UtcOffset::UTC), value)
    }

    pub fn remove(&mut self, timestamp: &OffsetDateTime) -> Option<f64> {
        self.entries.remove(timestamp)
    }

    pub fn get(&self, timestamp: &OffsetDateTime) -> Option<f64> {
        self.entries.get(timestamp).copied()
    }

    pub fn contains(&self, timestamp: &OffsetDateTime) -> bool {
        self.entries.contains_key(timestamp)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first(&self) -> Option<Record> {
        self.entries
            .first_key_value()
            .map(|(ts, value)| Record::new(*ts, *value))
    }

    pub fn last(&self) -> Option<Record> {
        self.entries
            .last_key_value()
            .map(|(ts, value)| Record::new(*ts, *value))
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Record> + '_ {
        self.entries
            .iter()
            .map(|(ts, value)| Record::new(*ts, *value))
    }

    pub fn timestamps(&self) -> impl DoubleEndedIterator<Item = OffsetDateTime> + '_ {
        self.entries.keys().copied()
    }

    /// Records inside `window`.
    pub fn range(&self, window: Window) -> RecordSet {
        if window.is_empty() {
            return RecordSet::new();
        }
        self.entries
            .range(window.start..window.end)
            .map(|(ts, value)| Record::new(*ts, *value))
            .collect()
    }

    /// Latest record strictly before `ts`.
    pub fn before(&self, ts: OffsetDateTime) -> Option<Record> {
        self.entries
            .range(..ts)
            .next_back()
            .map(|(ts, value)| Record::new(*ts, *value))
    }

    /// Earliest record strictly after `ts`.
    pub fn after(&self, ts: OffsetDateTime) -> Option<Record> {
        use std::ops::Bound::{Excluded, Unbounded};
        self.entries
            .range((Excluded(ts), Unbounded))
            .next()
            .map(|(ts, value)| Record::new(*ts, *value))
    }

    /// Merge `other` into `self`; `other` wins on equal timestamps.
    pub fn upsert(&mut self, other: &RecordSet) -> usize {
        self.entries.extend(other.entries.iter());
        other.len()
    }

    /// Drop every record inside `window`, returning how many were removed.
    pub fn remove_window(&mut self, window: Window) -> usize {
        let before = self.entries.len();
        self.entries.retain(|ts, _| !window.contains(*ts));
        before - self.entries.len()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&OffsetDateTime, f64) -> bool) {
        self.entries.retain(|ts, value| keep(ts, *value));
    }

    /// Timestamps present in `self` but not in `other`.
    pub fn difference<'a>(
        &'a self,
        other: &'a RecordSet,
    ) -> impl Iterator<Item = OffsetDateTime> + 'a {
        self.timestamps().filter(move |ts| !other.contains(ts))
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut set = RecordSet::new();
        for record in iter {
            set.insert(record.timestamp, record.value);
        }
        set
    }
}

impl Extend<Record> for RecordSet {
    fn extend<I: IntoIterator<Item = Record>>(&mut self, iter: I) {
        for record in iter {
            self.insert(record.timestamp, record.value);
        }
    }
}

impl IntoIterator for RecordSet {
    type Item = Record;
    type IntoIter = std::iter::Map<
        btree_map::IntoIter<OffsetDateTime, f64>,
        fn((OffsetDateTime, f64)) -> Record,
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.entries
            .into_iter()
            .map(entry_to_record as fn((OffsetDateTime, f64)) -> Record)
    }
}

fn entry_to_record((timestamp, value): (OffsetDateTime, f64)) -> Record {
    Record::new(timestamp, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn sample() -> RecordSet {
        [
            Record::new(datetime!(2024-01-01 00:00 UTC), 1.0),
            Record::new(datetime!(2024-01-01 01:00 UTC), 2.0),
            Record::new(datetime!(2024-01-01 02:00 UTC), 3.0),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn insert_normalizes_to_utc() {
        let mut set = RecordSet::new();
        set.insert(datetime!(2024-01-01 02:00 +2), 5.0);
        assert_eq!(set.get(&datetime!(2024-01-01 00:00 UTC)), Some(5.0));
        assert!(set.first().is_some_and(|r| r.timestamp.offset().is_utc()));
    }

    #[test]
    fn range_is_half_open() {
        let set = sample();
        let window = Window::new(
            datetime!(2024-01-01 00:00 UTC),
            datetime!(2024-01-01 02:00 UTC),
        );
        let slice = set.range(window);
        assert_eq!(slice.len(), 2);
        assert!(!slice.contains(&datetime!(2024-01-01 02:00 UTC)));
    }

    #[test]
    fn neighbours() {
        let set = sample();
        let ts = datetime!(2024-01-01 01:00 UTC);
        assert_eq!(set.before(ts).map(|r| r.value), Some(1.0));
        assert_eq!(set.after(ts).map(|r| r.value), Some(3.0));
        assert!(set.before(datetime!(2024-01-01 00:00 UTC)).is_none());
    }

    #[test]
    fn upsert_overwrites() {
        let mut set = sample();
        let update: RecordSet = [Record::new(datetime!(2024-01-01 01:00 UTC), 9.0)]
            .into_iter()
            .collect();
        set.upsert(&update);
        assert_eq!(set.len(), 3);
        assert_eq!(set.get(&datetime!(2024-01-01 01:00 UTC)), Some(9.0));
    }

    #[test]
    fn difference_lists_new_timestamps() {
        let set = sample();
        let other: RecordSet = [
            Record::new(datetime!(2024-01-01 00:00 UTC), 1.0),
            Record::new(datetime!(2024-01-01 00:30 UTC), 1.5),
        ]
        .into_iter()
        .collect();
        let new: Vec<_> = other.difference(&set).collect();
        assert_eq!(new, vec![datetime!(2024-01-01 00:30 UTC)]);
    }

    #[test]
    fn data_type_normalization() {
        assert_eq!(DataType::Integer.normalize(2.6), 3.0);
        assert_eq!(DataType::Boolean.normalize(0.4), 0.0);
        assert_eq!(DataType::Boolean.normalize(0.5), 1.0);
        assert_eq!(DataType::Float.normalize(0.25), 0.25);
    }
}
