//! Boundaries of a period anchored at a reference instant.
//!
//! The boundaries form the sequence `anchor + k * period` for every integer
//! `k`. Lookups use modular arithmetic on nanosecond offsets, so their cost
//! does not depend on how far the anchor lies from `now`.

use chrono::{DateTime, TimeDelta, TimeZone};

use super::Duration;
use crate::error::ValidationError;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// A strictly positive period length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(TimeDelta);

impl Period {
    pub fn new(delta: TimeDelta) -> Result<Self, ValidationError> {
        if delta <= TimeDelta::zero() {
            return Err(ValidationError::NonPositivePeriod);
        }
        Ok(Self(delta))
    }

    pub fn one_day() -> Self {
        Self(TimeDelta::days(1))
    }

    pub fn as_delta(&self) -> TimeDelta {
        self.0
    }
}

impl TryFrom<Duration> for Period {
    type Error = ValidationError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Self::new(value.as_delta())
    }
}

/// The smallest boundary that is at or after `now`.
pub fn next_boundary<Tz: TimeZone, Ta: TimeZone>(
    now: &DateTime<Tz>,
    anchor: &DateTime<Ta>,
    period: Period,
) -> DateTime<Tz> {
    let offset = offset_past_boundary(now, anchor, period);
    if offset == 0 {
        return now.clone();
    }
    now.clone() + from_nanos(to_nanos(period.0) - offset)
}

/// The largest boundary that is at or before `now`.
pub fn previous_boundary<Tz: TimeZone, Ta: TimeZone>(
    now: &DateTime<Tz>,
    anchor: &DateTime<Ta>,
    period: Period,
) -> DateTime<Tz> {
    let offset = offset_past_boundary(now, anchor, period);
    now.clone() - from_nanos(offset)
}

/// Nanoseconds elapsed since the last boundary, in `[0, period)`.
fn offset_past_boundary<Tz: TimeZone, Ta: TimeZone>(
    now: &DateTime<Tz>,
    anchor: &DateTime<Ta>,
    period: Period,
) -> i128 {
    let since_anchor = now.clone().signed_duration_since(anchor.clone());
    to_nanos(since_anchor).rem_euclid(to_nanos(period.0))
}

fn to_nanos(delta: TimeDelta) -> i128 {
    // `subsec_nanos` carries the sign of the delta, so the sum is exact.
    delta.num_seconds() as i128 * NANOS_PER_SECOND + delta.subsec_nanos() as i128
}

fn from_nanos(nanos: i128) -> TimeDelta {
    let secs = (nanos / NANOS_PER_SECOND) as i64;
    let rest = (nanos % NANOS_PER_SECOND) as i64;
    TimeDelta::seconds(secs) + TimeDelta::nanoseconds(rest)
}
