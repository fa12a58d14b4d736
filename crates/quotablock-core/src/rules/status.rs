//! Tri-state status derivation for a rule set.
//!
//! Status is never stored. It is recomputed on every call from the instant,
//! the config and the persisted state.
//!
//! ```text
//! inactive  -- outside the daily window
//! tracking  -- inside, quota left (or a reset happens right now)
//! blocking  -- inside, quota exhausted for the current period
//! ```

use std::fmt;

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use super::{RuleSetConfig, RuleSetState};
use crate::time::next_boundary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Inactive,
    Tracking,
    Blocking,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Inactive => write!(f, "inactive"),
            Status::Tracking => write!(f, "tracking"),
            Status::Blocking => write!(f, "blocking"),
        }
    }
}

pub fn current_status<Tz: TimeZone>(
    now: &DateTime<Tz>,
    config: &RuleSetConfig,
    state: &RuleSetState,
) -> Status {
    if !config.window().is_inside(now) {
        return Status::Inactive;
    }

    let allowance_left = !config.quota_allowed.is_zero();
    let next_reset = next_boundary(now, &state.last_quota_reset, config.period());
    if next_reset <= *now && allowance_left {
        return Status::Tracking;
    }
    if next_reset > *now && config.quota_allowed > state.quota_used {
        return Status::Tracking;
    }
    Status::Blocking
}

/// When a blocked rule set next stops blocking.
///
/// Returns `now` when it is not blocking, and `None` when the block cannot
/// end under the current configuration (no allowance and a window covering
/// every hour of every day).
pub fn next_non_blocking_moment<Tz: TimeZone>(
    now: &DateTime<Tz>,
    config: &RuleSetConfig,
    state: &RuleSetState,
) -> Option<DateTime<Tz>> {
    if current_status(now, config, state) != Status::Blocking {
        return Some(now.clone());
    }

    let next_inactive = config.window().next_outside(now);
    let next_reset = if config.quota_allowed.is_zero() {
        None
    } else {
        Some(next_boundary(now, &state.last_quota_reset, config.period()))
    };

    match (next_inactive, next_reset) {
        (Some(a), Some(b)) => Some(if a <= b { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Whether `url` matches the configured or tainted patterns.
///
/// Compiles the patterns on every call; callers matching repeatedly keep a
/// [`RuleSetState::pattern_set`] instead.
pub fn affects_url(url: &str, config: &RuleSetConfig, state: &RuleSetState) -> bool {
    state.pattern_set(config).matches(url)
}
