//! Quota accrual and reset.
//!
//! The driver calls [`rollover`] and then [`accrue`] once per rule set per
//! tick. Usage is sampled: each tick in which the focused tab matches adds
//! one [`tick`] worth of usage.

use chrono::{DateTime, TimeZone, Utc};

use super::status::{current_status, Status};
use super::{RuleSetConfig, RuleSetState};
use crate::browser::BrowserTabs;
use crate::pattern::PatternSet;
use crate::time::{previous_boundary, Duration};

/// Length of one tick in seconds.
pub const TICK_SECONDS: u32 = 1;

/// Usage added per sampled tick.
pub fn tick() -> Duration {
    Duration::seconds(TICK_SECONDS)
}

/// Resets usage when a quota period boundary has passed since the last
/// recorded reset, and ratchets the config's anchor forward to it.
///
/// Returns `true` when a reset happened. Calling it again within the same
/// period is a no-op.
pub fn rollover<Tz: TimeZone>(
    now: &DateTime<Tz>,
    config: &mut RuleSetConfig,
    state: &mut RuleSetState,
) -> bool {
    let latest = previous_boundary(now, &config.quota_reset_anchor, config.period()).with_timezone(&Utc);
    if latest == state.last_quota_reset {
        return false;
    }

    state.quota_used = Duration::ZERO;
    state.last_quota_reset = latest;
    config.quota_reset_anchor = latest;
    true
}

/// Adds one tick of usage when the rule set is tracking and the focused tab
/// matches it.
///
/// A failed lookup counts as "no active URL". Returns `true` when usage was
/// added.
pub async fn accrue<Tz, B>(
    now: &DateTime<Tz>,
    config: &RuleSetConfig,
    state: &mut RuleSetState,
    tabs: &B,
) -> bool
where
    Tz: TimeZone,
    B: BrowserTabs + ?Sized,
{
    let patterns = state.pattern_set(config);
    accrue_matching(now, config, state, &patterns, tabs).await
}

/// [`accrue`] with the rule set's patterns already compiled.
pub async fn accrue_matching<Tz, B>(
    now: &DateTime<Tz>,
    config: &RuleSetConfig,
    state: &mut RuleSetState,
    patterns: &PatternSet,
    tabs: &B,
) -> bool
where
    Tz: TimeZone,
    B: BrowserTabs + ?Sized,
{
    if current_status(now, config, state) != Status::Tracking {
        return false;
    }

    let url = match tabs.active_url().await {
        Ok(url) => url,
        Err(err) => {
            tracing::warn!(rule_set = %config.id, error = %err, "active tab lookup failed");
            None
        }
    };

    match url {
        Some(url) if patterns.matches(&url) => {
            state.quota_used += tick();
            tracing::trace!(rule_set = %config.id, used = %state.quota_used, "quota accrued");
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::Tab;
    use crate::error::TabQueryError;
    use crate::time::DayTime;
    use async_trait::async_trait;
    use chrono::TimeDelta;

    struct FocusedOn(Option<&'static str>);

    #[async_trait]
    impl BrowserTabs for FocusedOn {
        async fn active_url(&self) -> Result<Option<String>, TabQueryError> {
            Ok(self.0.map(String::from))
        }

        async fn all_tabs(&self) -> Result<Vec<Tab>, TabQueryError> {
            Ok(Vec::new())
        }
    }

    struct Broken;

    #[async_trait]
    impl BrowserTabs for Broken {
        async fn active_url(&self) -> Result<Option<String>, TabQueryError> {
            Err(TabQueryError::Failed("no window".into()))
        }

        async fn all_tabs(&self) -> Result<Vec<Tab>, TabQueryError> {
            Err(TabQueryError::Failed("no window".into()))
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn daily() -> (RuleSetConfig, RuleSetState) {
        let mut config = RuleSetConfig::new("News");
        config.patterns = vec!["*://news.test/*".into()];
        config.start_time = DayTime::MIDNIGHT;
        config.end_time = DayTime::END_OF_DAY;
        config.days = [true; 7];
        config.quota_reset_anchor = at("2017-09-01T00:00:00Z");
        let state = RuleSetState::initial(&config);
        (config, state)
    }

    #[test]
    fn rollover_resets_usage_and_ratchets_anchor() {
        let (mut config, mut state) = daily();
        state.quota_used = Duration::minutes(7);
        let now = at("2017-09-08T12:00:00Z");

        assert!(rollover(&now, &mut config, &mut state));
        assert_eq!(state.quota_used, Duration::ZERO);
        assert_eq!(state.last_quota_reset, at("2017-09-08T00:00:00Z"));
        assert_eq!(config.quota_reset_anchor, at("2017-09-08T00:00:00Z"));
    }

    #[test]
    fn rollover_is_idempotent_within_a_period() {
        let (mut config, mut state) = daily();
        let now = at("2017-09-08T12:00:00Z");
        assert!(rollover(&now, &mut config, &mut state));

        state.quota_used = Duration::minutes(3);
        let (config_before, state_before) = (config.clone(), state.clone());
        assert!(!rollover(&now, &mut config, &mut state));
        assert!(!rollover(&(now + TimeDelta::hours(11)), &mut config, &mut state));
        assert_eq!(config, config_before);
        assert_eq!(state, state_before);

        assert!(rollover(&at("2017-09-09T00:00:00Z"), &mut config, &mut state));
        assert_eq!(state.quota_used, Duration::ZERO);
    }

    #[tokio::test]
    async fn accrues_one_tick_on_matching_focus() {
        let (config, mut state) = daily();
        let now = at("2017-09-08T12:00:00Z");
        assert!(accrue(&now, &config, &mut state, &FocusedOn(Some("https://news.test/a"))).await);
        assert!(accrue(&now, &config, &mut state, &FocusedOn(Some("https://news.test/b"))).await);
        assert_eq!(state.quota_used, Duration::seconds(2));
    }

    #[tokio::test]
    async fn ignores_unrelated_or_missing_focus() {
        let (config, mut state) = daily();
        let now = at("2017-09-08T12:00:00Z");
        assert!(!accrue(&now, &config, &mut state, &FocusedOn(Some("https://docs.test/"))).await);
        assert!(!accrue(&now, &config, &mut state, &FocusedOn(None)).await);
        assert!(!accrue(&now, &config, &mut state, &Broken).await);
        assert_eq!(state.quota_used, Duration::ZERO);
    }

    #[tokio::test]
    async fn tainted_patterns_accrue_too() {
        let (config, mut state) = daily();
        state.tainted_urls.insert("*://video.test/*".into());
        let now = at("2017-09-08T12:00:00Z");
        assert!(accrue(&now, &config, &mut state, &FocusedOn(Some("https://video.test/x"))).await);
    }

    #[tokio::test]
    async fn precompiled_patterns_decide_the_match() {
        let (config, mut state) = daily();
        let now = at("2017-09-08T12:00:00Z");
        let tabs = FocusedOn(Some("https://video.test/x"));

        let video = PatternSet::new(["*://video.test/*"]);
        assert!(accrue_matching(&now, &config, &mut state, &video, &tabs).await);
        let stale = state.pattern_set(&config);
        assert!(!accrue_matching(&now, &config, &mut state, &stale, &tabs).await);
        assert_eq!(state.quota_used, Duration::seconds(1));
    }

    #[tokio::test]
    async fn no_accrual_unless_tracking() {
        let (mut config, mut state) = daily();
        config.quota_allowed = Duration::seconds(2);
        let now = at("2017-09-08T12:00:00Z");
        let tabs = FocusedOn(Some("https://news.test/"));

        assert!(accrue(&now, &config, &mut state, &tabs).await);
        assert!(accrue(&now, &config, &mut state, &tabs).await);
        // Allowance used up: blocking now, usage stays put.
        assert_eq!(current_status(&now, &config, &state), Status::Blocking);
        assert!(!accrue(&now, &config, &mut state, &tabs).await);
        assert_eq!(state.quota_used, Duration::seconds(2));

        config.days = [false; 7];
        state.quota_used = Duration::ZERO;
        assert!(!accrue(&now, &config, &mut state, &tabs).await);
    }
}
