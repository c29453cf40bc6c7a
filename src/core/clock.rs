use time::OffsetDateTime;

/// A source of "now" for maintenance runs.
///
/// Retention cutoffs and sync end bounds are computed against this clock, so
/// tests can pin the wall time instead of racing it.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current instant in UTC.
    fn now(&self) -> OffsetDateTime;
}

/// A clock that uses the system wall time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn fixed_clock_does_not_move() {
        let clock = FixedClock(datetime!(2024-03-01 12:00 UTC));
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now(), datetime!(2024-03-01 12:00 UTC));
    }

    #[test]
    fn system_clock_is_utc() {
        let now = SystemClock.now();
        assert!(now.offset().is_utc());
    }
}
