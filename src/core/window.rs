//! Time windows and calendar slicing.
//!
//! All windows are half-open `[start, end)`. Closed intervals are expressed by
//! extending the end by one nanosecond, the finest timestamp resolution.

use std::fmt;

use time::{Date, Duration, Month, OffsetDateTime, Time, UtcOffset};

/// Smallest step used to advance past an already-synced timestamp.
pub const TICK: Duration = Duration::SECOND;

/// A half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl Window {
    pub fn new(start: OffsetDateTime, end: OffsetDateTime) -> Self {
        Self {
            start: start.to_offset(UtcOffset::UTC),
            end: end.to_offset(UtcOffset::UTC),
        }
    }

    /// Window covering `[start, end]`.
    pub fn closed(start: OffsetDateTime, end: OffsetDateTime) -> Self {
        Self::new(start, end + Duration::NANOSECOND)
    }

    /// Window holding exactly one instant.
    pub fn at(ts: OffsetDateTime) -> Self {
        Self::new(ts, ts + Duration::NANOSECOND)
    }

    pub fn contains(&self, ts: OffsetDateTime) -> bool {
        self.start <= ts && ts < self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            format_timestamp(self.start),
            format_timestamp(self.end)
        )
    }
}

/// Calendar granularity used to cut a range into work units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Day,
    Month,
}

impl Frequency {
    /// The first calendar boundary strictly after `ts`, in UTC.
    pub fn next_boundary(self, ts: OffsetDateTime) -> Option<OffsetDateTime> {
        let date = ts.to_offset(UtcOffset::UTC).date();
        let next = match self {
            Frequency::Day => date.next_day()?,
            Frequency::Month => {
                let (year, month) = match date.month() {
                    Month::December => (date.year().checked_add(1)?, Month::January),
                    month => (date.year(), month.next()),
                };
                Date::from_calendar_date(year, month, 1).ok()?
            }
        };
        Some(next.midnight().assume_utc())
    }
}

/// Partition `[start, end)` into consecutive windows cut at calendar
/// boundaries. The first and last windows may be partial.
pub fn slice_range(start: OffsetDateTime, end: OffsetDateTime, freq: Frequency) -> Vec<Window> {
    let mut windows = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let boundary = freq
            .next_boundary(cursor)
            .map_or(end, |boundary| boundary.min(end));
        windows.push(Window::new(cursor, boundary));
        cursor = boundary;
    }
    windows
}

/// Midnight UTC of the day holding `ts`.
pub fn floor_day(ts: OffsetDateTime) -> OffsetDateTime {
    ts.to_offset(UtcOffset::UTC).replace_time(Time::MIDNIGHT)
}

/// Largest multiple of `step` since the UNIX epoch that is `<= ts`.
pub fn align_floor(ts: OffsetDateTime, step: Duration) -> OffsetDateTime {
    let step_ns = step.whole_nanoseconds();
    if step_ns <= 0 {
        return ts;
    }
    let rem = ts.unix_timestamp_nanos().rem_euclid(step_ns);
    ts - Duration::nanoseconds(rem as i64)
}

/// Smallest multiple of `step` since the UNIX epoch that is `>= ts`.
pub fn align_ceil(ts: OffsetDateTime, step: Duration) -> OffsetDateTime {
    let floored = align_floor(ts, step);
    if floored < ts {
        floored + step
    } else {
        floored
    }
}

pub fn format_timestamp(ts: OffsetDateTime) -> String {
    let ts = ts.to_offset(UtcOffset::UTC);
    format!(
        "{:02}.{:02}.{:04} ({:02}:{:02}:{:02})",
        ts.day(),
        ts.month() as u8,
        ts.year(),
        ts.hour(),
        ts.minute(),
        ts.second()
    )
}
