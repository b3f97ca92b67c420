//! Daemon scheduling
//!
//! Intervals are written as `<n>[d|h|m|s]` (`1d`, `12h`, `30m`, `3600s`); a
//! bare number means days. The daemon fires once at start and then at every
//! interval until a shutdown signal cancels it.

mod daemon;
mod interval;

pub use daemon::run_daemon;
pub use interval::{parse_interval, IntervalUnit, ScheduleInterval};
