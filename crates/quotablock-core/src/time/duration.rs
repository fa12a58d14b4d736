//! Non-negative spans of time with an ISO-8601 text form.
//!
//! Only fixed-length designators are supported: weeks, days, hours, minutes
//! and (fractional) seconds. Years and months have no fixed length and are
//! rejected at parse time.

use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Duration(TimeDelta);

impl Duration {
    pub const ZERO: Duration = Duration(TimeDelta::zero());

    /// Wraps a non-negative [`TimeDelta`].
    pub fn new(delta: TimeDelta) -> Result<Self, ValidationError> {
        if delta < TimeDelta::zero() {
            return Err(ValidationError::InvalidDuration {
                value: delta.to_string(),
                message: "duration must not be negative".into(),
            });
        }
        Ok(Self(delta))
    }

    pub fn seconds(secs: u32) -> Self {
        Self(TimeDelta::seconds(secs as i64))
    }

    pub fn minutes(mins: u32) -> Self {
        Self(TimeDelta::minutes(mins as i64))
    }

    pub fn hours(hours: u32) -> Self {
        Self(TimeDelta::hours(hours as i64))
    }

    pub fn days(days: u32) -> Self {
        Self(TimeDelta::days(days as i64))
    }

    pub fn as_delta(&self) -> TimeDelta {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration(self.0.checked_add(&rhs.0).unwrap_or(TimeDelta::MAX))
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl From<Duration> for TimeDelta {
    fn from(value: Duration) -> Self {
        value.0
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0.num_seconds();
        let nanos = self.0.subsec_nanos();
        if total == 0 && nanos == 0 {
            return f.write_str("PT0S");
        }

        let days = total / 86_400;
        let hours = (total % 86_400) / 3_600;
        let minutes = (total % 3_600) / 60;
        let seconds = total % 60;

        f.write_str("P")?;
        if days > 0 {
            write!(f, "{days}D")?;
        }
        if hours == 0 && minutes == 0 && seconds == 0 && nanos == 0 {
            return Ok(());
        }
        f.write_str("T")?;
        if hours > 0 {
            write!(f, "{hours}H")?;
        }
        if minutes > 0 {
            write!(f, "{minutes}M")?;
        }
        if seconds > 0 || nanos > 0 {
            if nanos > 0 {
                let frac = format!("{nanos:09}");
                write!(f, "{seconds}.{}S", frac.trim_end_matches('0'))?;
            } else {
                write!(f, "{seconds}S")?;
            }
        }
        Ok(())
    }
}

impl FromStr for Duration {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |message: &str| ValidationError::InvalidDuration {
            value: s.to_string(),
            message: message.to_string(),
        };

        let body = s
            .strip_prefix('P')
            .or_else(|| s.strip_prefix('p'))
            .ok_or_else(|| invalid("expected a leading 'P'"))?;
        if body.is_empty() {
            return Err(invalid("no components"));
        }

        let mut total = TimeDelta::zero();
        let mut in_time = false;
        let mut saw_component = false;
        let mut saw_time_component = false;
        let mut last_rank = None;
        let mut number = String::new();

        for ch in body.chars() {
            let ch = ch.to_ascii_uppercase();
            match ch {
                '0'..='9' | '.' | ',' => number.push(if ch == ',' { '.' } else { ch }),
                'T' => {
                    if in_time || !number.is_empty() {
                        return Err(invalid("misplaced 'T'"));
                    }
                    in_time = true;
                }
                designator => {
                    if number.is_empty() {
                        return Err(invalid("designator without a value"));
                    }
                    let part = component(&number, designator, in_time).map_err(|m| invalid(m))?;
                    let rank = rank(designator, in_time);
                    if last_rank.is_some_and(|last| rank <= last) {
                        return Err(invalid("designators repeated or out of order"));
                    }
                    last_rank = Some(rank);
                    saw_time_component |= in_time;
                    total = total
                        .checked_add(&part)
                        .ok_or_else(|| invalid("duration too large"))?;
                    number.clear();
                    saw_component = true;
                }
            }
        }

        if !number.is_empty() {
            return Err(invalid("trailing number without designator"));
        }
        if !saw_component {
            return Err(invalid("no components"));
        }
        if in_time && !saw_time_component {
            return Err(invalid("'T' without a time component"));
        }
        Ok(Duration(total))
    }
}

/// Position of a designator in `PnWnDTnHnMnS`.
fn rank(designator: char, in_time: bool) -> u8 {
    match (designator, in_time) {
        ('W', false) => 0,
        ('D', false) => 1,
        ('H', true) => 2,
        ('M', true) => 3,
        _ => 4,
    }
}

fn component(number: &str, designator: char, in_time: bool) -> Result<TimeDelta, &'static str> {
    if designator == 'S' && in_time {
        return fractional_seconds(number);
    }
    if number.contains('.') {
        return Err("only seconds may be fractional");
    }
    let value: i64 = number.parse().map_err(|_| "invalid number")?;
    let delta = match (designator, in_time) {
        ('W', false) => TimeDelta::try_weeks(value),
        ('D', false) => TimeDelta::try_days(value),
        ('H', true) => TimeDelta::try_hours(value),
        ('M', true) => TimeDelta::try_minutes(value),
        ('Y', false) | ('M', false) => return Err("years and months have no fixed length"),
        _ => return Err("unknown designator"),
    };
    delta.ok_or("duration too large")
}

fn fractional_seconds(number: &str) -> Result<TimeDelta, &'static str> {
    let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() || frac.len() > 9 || frac.contains('.') {
        return Err("invalid seconds value");
    }
    let secs: i64 = whole.parse().map_err(|_| "invalid seconds value")?;
    let nanos: i64 = if frac.is_empty() {
        0
    } else {
        let digits: i64 = frac.parse().map_err(|_| "invalid seconds value")?;
        digits * 10_i64.pow(9 - frac.len() as u32)
    };
    let whole = TimeDelta::try_seconds(secs).ok_or("duration too large")?;
    whole
        .checked_add(&TimeDelta::nanoseconds(nanos % NANOS_PER_SECOND))
        .ok_or("duration too large")
}

impl TryFrom<String> for Duration {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Duration> for String {
    fn from(value: Duration) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_forms() {
        assert_eq!("PT1H30M".parse::<Duration>().unwrap(), Duration::minutes(90));
        assert_eq!("P1D".parse::<Duration>().unwrap(), Duration::days(1));
        assert_eq!("P2W".parse::<Duration>().unwrap(), Duration::days(14));
        assert_eq!("PT0S".parse::<Duration>().unwrap(), Duration::ZERO);
        assert_eq!(
            "PT1H29M58S".parse::<Duration>().unwrap(),
            Duration::seconds(3600 + 29 * 60 + 58)
        );
        assert_eq!(
            "PT0.123S".parse::<Duration>().unwrap().as_delta(),
            TimeDelta::milliseconds(123)
        );
    }

    #[test]
    fn rejects_calendar_units_and_garbage() {
        for bad in ["P1Y", "P1M", "1D", "P", "PT", "PT1", "P1H", "PTH", "P1.5D", "PT1.2.3S"] {
            assert!(bad.parse::<Duration>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn rejects_non_canonical_designators() {
        for bad in ["P1DT", "PT1M1H", "PT1H1H", "P1D1W", "P1DT1S1M", "PT1S1S"] {
            assert!(bad.parse::<Duration>().is_err(), "{bad} should be rejected");
        }
        assert_eq!("P1W2DT3H4M5S".parse::<Duration>().unwrap().to_string(), "P9DT3H4M5S");
    }

    #[test]
    fn minutes_after_t_are_minutes() {
        assert_eq!("PT10M".parse::<Duration>().unwrap(), Duration::minutes(10));
    }

    #[test]
    fn formats_canonically() {
        assert_eq!(Duration::ZERO.to_string(), "PT0S");
        assert_eq!(Duration::minutes(10).to_string(), "PT10M");
        assert_eq!(Duration::days(1).to_string(), "P1D");
        assert_eq!((Duration::days(1) + Duration::seconds(61)).to_string(), "P1DT1M1S");
        let d = Duration::new(TimeDelta::milliseconds(1500)).unwrap();
        assert_eq!(d.to_string(), "PT1.5S");
    }

    #[test]
    fn negative_deltas_are_rejected() {
        assert!(Duration::new(TimeDelta::seconds(-1)).is_err());
    }

    #[test]
    fn addition_accumulates() {
        let mut used = Duration::ZERO;
        for _ in 0..90 {
            used += Duration::seconds(1);
        }
        assert_eq!(used, "PT1M30S".parse().unwrap());
    }
}
