//! # Quotablock Core Library
//!
//! This library provides the core logic for Quotablock, a time-based site
//! blocker. Each rule set names a group of sites, a recurring daily window
//! and a usage quota; while inside the window the sites may be used until
//! the quota for the current period runs out, after which they are blocked
//! until the window closes or the quota resets.
//!
//! ## Architecture
//!
//! - **Time**: calendar arithmetic for daily windows and anchored periods
//! - **Rules**: rule set configuration, persisted usage state, quota
//!   rollover/accrual and the three-state status decision
//! - **Pattern**: compiles browser match patterns into URL matchers
//! - **Driver**: the tick loop that samples the browser and redirects tabs
//! - **Storage**: SQLite key-value persistence and TOML settings
//!
//! ## Key Components
//!
//! - [`current_status`]: inactive / tracking / blocking for an instant
//! - [`next_non_blocking_moment`]: when a block ends
//! - [`Driver`]: rollover, accrual, redirects and persistence per tick
//! - [`SqliteStore`]: rule set and state persistence
//! - [`Settings`]: driver configuration

pub mod browser;
pub mod driver;
pub mod error;
pub mod notice;
pub mod pattern;
pub mod rules;
pub mod storage;
pub mod time;

pub use browser::{BlockPage, BrowserTabs, Tab, TabId, TimeoutTabs};
pub use driver::{Driver, RuleSetReport, TickSummary};
pub use error::{ConfigError, CoreError, StorageError, TabQueryError, ValidationError};
pub use notice::BlockNotice;
pub use pattern::{MatchPattern, PatternSet, UrlMatcher};
pub use rules::{
    accrue, affects_url, current_status, next_non_blocking_moment, rollover, RuleSetConfig,
    RuleSetId, RuleSetState, Status,
};
pub use storage::{MemoryStore, Settings, SqliteStore, StateStore, TimeZoneSetting};
pub use time::{next_boundary, previous_boundary, DailyWindow, DayTime, Duration, Period};
