//! Detection of missing stretches in raw data.
//!
//! Homogenizing interpolates across any distance, so grid points that fall
//! into a period without raw samples would invent data. Such periods are
//! detected on the raw samples and the grid points inside them are removed.

use std::fmt;

use time::{Duration, OffsetDateTime};

use crate::core::{format_timestamp, TICK};
use crate::store::RecordSet;

/// A period without raw samples, bounded by the last sample before it
/// (`start`) and the first sample after it (`end`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl Gap {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

impl fmt::Display for Gap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            format_timestamp(self.start),
            format_timestamp(self.end)
        )
    }
}

/// Find the gaps between consecutive finite samples of `raw`.
///
/// For samples `a < b` the expected next sample is at `a + resolution`; a gap
/// `(a, b)` is reported when at least one resolution passes after that without
/// a sample. Late samples within one resolution are not gaps.
pub fn find_gaps(raw: &RecordSet, resolution: Duration) -> Vec<Gap> {
    let samples: Vec<OffsetDateTime> = raw
        .iter()
        .filter(|record| record.value.is_finite())
        .map(|record| record.timestamp)
        .collect();

    samples
        .windows(2)
        .filter_map(|pair| {
            let gap = Gap {
                start: pair[0],
                end: pair[1],
            };
            (gap.duration() >= resolution * 2).then_some(gap)
        })
        .collect()
}

/// Remove grid points that lie inside a gap.
///
/// A grid point `t` is dropped when `gap.start + resolution - TICK < t <
/// gap.end`. Only grid points within one resolution of the last sample
/// before the gap survive, as does a grid point on the sample ending it.
pub fn strip_gaps(grid: &mut RecordSet, gaps: &[Gap], resolution: Duration) -> usize {
    if gaps.is_empty() {
        return 0;
    }
    let before = grid.len();
    grid.retain(|ts, _| {
        !gaps
            .iter()
            .any(|gap| *ts > gap.start + resolution - TICK && *ts < gap.end)
    });
    before - grid.len()
}
