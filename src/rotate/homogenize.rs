//! Resampling of raw samples onto a regular grid.
//!
//! Grid points are aligned to the Unix epoch: with a 15 minute resolution the
//! grid is `..., 00:00, 00:15, 00:30, ...` regardless of where the raw data
//! starts. The grid spans from the first raw sample rounded up to the last raw
//! sample rounded down, so no value is ever extrapolated.

use time::{Duration, OffsetDateTime};

use crate::core::{align_ceil, align_floor, Window};
use crate::rotate::ResampleMethod;
use crate::store::{DataType, RecordSet};

/// Resample `raw` onto the `resolution` grid.
///
/// Non-finite raw values are treated as missing. Every produced value is
/// passed through [`DataType::normalize`].
pub fn homogenize(
    raw: &RecordSet,
    resolution: Duration,
    method: ResampleMethod,
    data_type: DataType,
) -> RecordSet {
    let mut basis = raw.clone();
    basis.retain(|_, value| value.is_finite());

    let mut grid = RecordSet::new();
    let (first, last) = match (basis.first(), basis.last()) {
        (Some(first), Some(last)) => (first.timestamp, last.timestamp),
        _ => return grid,
    };
    if resolution <= Duration::ZERO {
        return grid;
    }

    let end = align_floor(last, resolution);
    let mut ts = align_ceil(first, resolution);
    while ts <= end {
        let value = match method {
            ResampleMethod::Interpolate => interpolate(&basis, ts),
            _ => aggregate(&basis, ts, resolution, method).or_else(|| interpolate(&basis, ts)),
        };
        if let Some(value) = value {
            grid.insert(ts, data_type.normalize(value));
        }
        ts += resolution;
    }
    grid
}

fn interpolate(basis: &RecordSet, ts: OffsetDateTime) -> Option<f64> {
    if let Some(value) = basis.get(&ts) {
        return Some(value);
    }
    let prev = basis.before(ts)?;
    let next = basis.after(ts)?;
    let span = (next.timestamp - prev.timestamp).as_seconds_f64();
    let offset = (ts - prev.timestamp).as_seconds_f64();
    Some(prev.value + (next.value - prev.value) * offset / span)
}

/// Aggregate the samples of the bucket `(ts - resolution, ts]`.
fn aggregate(
    basis: &RecordSet,
    ts: OffsetDateTime,
    resolution: Duration,
    method: ResampleMethod,
) -> Option<f64> {
    let bucket = basis.range(Window::new(
        ts - resolution + Duration::NANOSECOND,
        ts + Duration::NANOSECOND,
    ));
    if bucket.is_empty() {
        return None;
    }
    match method {
        ResampleMethod::Mean => {
            let sum: f64 = bucket.iter().map(|record| record.value).sum();
            Some(sum / bucket.len() as f64)
        }
        ResampleMethod::Max => bucket.iter().map(|record| record.value).reduce(f64::max),
        ResampleMethod::Last => bucket.last().map(|record| record.value),
        ResampleMethod::Interpolate => interpolate(basis, ts),
    }
}
