//! Time arithmetic: times of day, durations, daily windows and period
//! boundaries.

mod boundary;
mod daily_window;
mod day_time;
mod duration;

pub use boundary::{next_boundary, previous_boundary, Period};
pub use daily_window::{DailyWindow, WeekDays};
pub use day_time::DayTime;
pub use duration::Duration;
