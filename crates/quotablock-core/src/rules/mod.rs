//! Rule sets: what to block, when, and how much use is allowed.

mod config;
mod quota;
mod state;
mod status;

pub use config::{RuleSetConfig, RuleSetId};
pub use quota::{accrue, accrue_matching, rollover, tick, TICK_SECONDS};
pub use state::RuleSetState;
pub use status::{affects_url, current_status, next_non_blocking_moment, Status};
