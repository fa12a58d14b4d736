//! Recurring weekly time-of-day windows.
//!
//! A [`DailyWindow`] is active from `start` (inclusive) to `end` (exclusive)
//! on every flagged day of the week. All calendar arithmetic happens in the
//! time zone of the instant being evaluated.
//!
//! Windows that wrap past midnight (`start > end`) are not supported; rule
//! set validation rejects them before they reach this module.

use chrono::{
    DateTime, Datelike, Days, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeDelta, TimeZone,
};
use serde::{Deserialize, Serialize};

use super::DayTime;

/// Day flags indexed Sunday = 0 through Saturday = 6.
pub type WeekDays = [bool; 7];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyWindow {
    pub start_time: DayTime,
    pub end_time: DayTime,
    pub days: WeekDays,
}

impl DailyWindow {
    pub fn new(start_time: DayTime, end_time: DayTime, days: WeekDays) -> Self {
        Self {
            start_time,
            end_time,
            days,
        }
    }

    /// `00:00:00` to `24:00:00`.
    pub fn is_full_day(&self) -> bool {
        self.start_time == DayTime::MIDNIGHT && self.end_time == DayTime::END_OF_DAY
    }

    /// A window whose start equals its end is never active.
    pub fn is_empty(&self) -> bool {
        self.start_time == self.end_time
    }

    pub fn is_inside<Tz: TimeZone>(&self, instant: &DateTime<Tz>) -> bool {
        let date = instant.date_naive();
        if !self.is_flagged(date) {
            return false;
        }
        let start = self.start_on(&instant.timezone(), date);
        let end = at_local(&instant.timezone(), self.end_time.on(date));
        start <= *instant && *instant < end
    }

    /// The first instant at or after `instant` that lies inside the window.
    ///
    /// Returns `None` when the window can never be entered.
    pub fn next_inside<Tz: TimeZone>(&self, instant: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        if self.is_inside(instant) {
            return Some(instant.clone());
        }
        if self.is_empty() {
            return None;
        }

        let tz = instant.timezone();
        let today = instant.date_naive();
        if self.is_flagged(today) {
            let start_today = self.start_on(&tz, today);
            if *instant <= start_today {
                return Some(start_today);
            }
        }

        // Up to a week ahead, so a window flagged on a single weekday still
        // finds the same weekday next week.
        (1..=7u64)
            .filter_map(|i| today.checked_add_days(Days::new(i)))
            .find(|day| self.is_flagged(*day))
            .map(|day| self.start_on(&tz, day))
    }

    /// The first instant at or after `instant` that lies outside the window.
    ///
    /// Returns `None` when a full-day window is flagged on every day.
    pub fn next_outside<Tz: TimeZone>(&self, instant: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        if !self.is_inside(instant) {
            return Some(instant.clone());
        }

        let tz = instant.timezone();
        let today = instant.date_naive();
        if self.is_full_day() {
            return (1..=6u64)
                .filter_map(|i| today.checked_add_days(Days::new(i)))
                .find(|day| !self.is_flagged(*day))
                .map(|day| at_local(&tz, DayTime::MIDNIGHT.on(day)));
        }

        // Partial-day windows end on the day they start.
        Some(at_local(&tz, self.end_time.on(today)))
    }

    fn is_flagged(&self, date: NaiveDate) -> bool {
        self.days[date.weekday().num_days_from_sunday() as usize]
    }

    fn start_on<Tz: TimeZone>(&self, tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
        at_local(tz, self.start_time.on(date))
    }
}

/// Resolves a wall-clock time in `tz`.
///
/// Ambiguous times (clocks turned back) take the earlier instant. Times
/// skipped by a forward transition are read with the offset in effect before
/// the gap, which moves them forward by the gap length.
fn at_local<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            // A day earlier is well clear of the transition in either
            // direction from UTC.
            let before_gap = tz.offset_from_utc_datetime(&(local - TimeDelta::days(1))).fix();
            tz.from_utc_datetime(&(local - TimeDelta::seconds(before_gap.local_minus_utc() as i64)))
        }
    }
}
