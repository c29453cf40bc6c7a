//! Clock, cancellation and time-window primitives shared by the engines.

pub mod cancel;
pub mod clock;
pub mod window;

pub use cancel::CancelToken;
pub use clock::{Clock, FixedClock, SystemClock};
pub use window::{
    align_ceil, align_floor, floor_day, format_timestamp, slice_range, Frequency, Window, TICK,
};
