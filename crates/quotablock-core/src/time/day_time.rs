use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A time of day with millisecond precision.
///
/// `24:00:00` is a valid value and means "the end of the day". It is kept
/// distinct from `00:00:00` so that a half-open window can run until midnight
/// without wrapping into the next day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DayTime {
    hours: u8,
    minutes: u8,
    seconds: u8,
    milliseconds: u16,
}

impl DayTime {
    pub const MIDNIGHT: DayTime = DayTime {
        hours: 0,
        minutes: 0,
        seconds: 0,
        milliseconds: 0,
    };

    pub const END_OF_DAY: DayTime = DayTime {
        hours: 24,
        minutes: 0,
        seconds: 0,
        milliseconds: 0,
    };

    pub fn new(
        hours: u8,
        minutes: u8,
        seconds: u8,
        milliseconds: u16,
    ) -> Result<Self, ValidationError> {
        let in_range = minutes < 60 && seconds < 60 && milliseconds < 1000;
        let end_of_day = hours == 24 && minutes == 0 && seconds == 0 && milliseconds == 0;
        if !in_range || (hours > 23 && !end_of_day) {
            return Err(ValidationError::InvalidDayTime(format!(
                "{hours:02}:{minutes:02}:{seconds:02}.{milliseconds:03}"
            )));
        }
        Ok(Self {
            hours,
            minutes,
            seconds,
            milliseconds,
        })
    }

    /// Shorthand for a whole-second time of day.
    pub fn hms(hours: u8, minutes: u8, seconds: u8) -> Result<Self, ValidationError> {
        Self::new(hours, minutes, seconds, 0)
    }

    pub fn hours(&self) -> u8 {
        self.hours
    }

    pub fn minutes(&self) -> u8 {
        self.minutes
    }

    pub fn seconds(&self) -> u8 {
        self.seconds
    }

    pub fn milliseconds(&self) -> u16 {
        self.milliseconds
    }

    pub fn is_end_of_day(&self) -> bool {
        self.hours == 24
    }

    /// Offset from the start of the day.
    pub fn since_midnight(&self) -> TimeDelta {
        TimeDelta::hours(self.hours as i64)
            + TimeDelta::minutes(self.minutes as i64)
            + TimeDelta::seconds(self.seconds as i64)
            + TimeDelta::milliseconds(self.milliseconds as i64)
    }

    /// The wall-clock moment this time of day falls on for `date`.
    ///
    /// `24:00:00` resolves to midnight at the start of the following day.
    pub fn on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(NaiveTime::MIN) + self.since_midnight()
    }
}

impl fmt::Display for DayTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)?;
        if self.milliseconds > 0 {
            write!(f, ".{:03}", self.milliseconds)?;
        }
        Ok(())
    }
}

impl FromStr for DayTime {
    type Err = ValidationError;

    /// Parses `HH:mm:ss` or `HH:mm:ss.SSS`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidDayTime(s.to_string());

        let (clock, fraction) = match s.split_once('.') {
            Some((clock, fraction)) => (clock, Some(fraction)),
            None => (s, None),
        };

        let mut parts = clock.split(':');
        let mut field = |max_len: usize| -> Result<u8, ValidationError> {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || part.len() > max_len || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse::<u8>().map_err(|_| invalid())
        };
        let hours = field(2)?;
        let minutes = field(2)?;
        let seconds = field(2)?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        let milliseconds = match fraction {
            None => 0,
            Some(frac) if frac.len() == 3 && frac.bytes().all(|b| b.is_ascii_digit()) => {
                frac.parse::<u16>().map_err(|_| invalid())?
            }
            Some(_) => return Err(invalid()),
        };

        Self::new(hours, minutes, seconds, milliseconds).map_err(|_| invalid())
    }
}

impl TryFrom<String> for DayTime {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DayTime> for String {
    fn from(value: DayTime) -> Self {
        value.to_string()
    }
}
