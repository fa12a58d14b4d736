//! Integration tests for the blocking engine.
//!
//! These tests drive the public API through whole days of usage: windows
//! opening and closing, quota running out and resetting, and block notices
//! handed to the block page.

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use quotablock_core::rules::{accrue, rollover};
use quotablock_core::time::WeekDays;
use quotablock_core::{
    affects_url, current_status, next_non_blocking_moment, BlockNotice, BrowserTabs, DailyWindow,
    DayTime, Duration, RuleSetConfig, RuleSetState, Status, Tab, TabQueryError,
};

struct Focused(&'static str);

#[async_trait::async_trait]
impl BrowserTabs for Focused {
    async fn active_url(&self) -> Result<Option<String>, TabQueryError> {
        Ok(Some(self.0.to_string()))
    }

    async fn all_tabs(&self) -> Result<Vec<Tab>, TabQueryError> {
        Ok(vec![Tab { id: 1, url: Some(self.0.to_string()) }])
    }
}

fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

const THU_SAT: WeekDays = [false, false, false, false, true, false, true];

#[test]
fn test_window_scenarios() {
    let window = DailyWindow::new(
        DayTime::hms(4, 59, 0).unwrap(),
        DayTime::hms(6, 3, 0).unwrap(),
        THU_SAT,
    );

    let friday = at("2017-09-08T12:34:56.789Z");
    assert!(!window.is_inside(&friday));
    assert_eq!(window.next_inside(&friday), Some(at("2017-09-09T04:59:00Z")));
    assert_eq!(window.next_outside(&friday), Some(friday));

    let saturday = at("2017-09-09T05:00:00Z");
    assert!(window.is_inside(&saturday));
    assert_eq!(window.next_outside(&saturday), Some(at("2017-09-09T06:03:00Z")));

    let full = DailyWindow::new(
        DayTime::MIDNIGHT,
        DayTime::END_OF_DAY,
        [true, true, false, true, true, false, true],
    );
    let tuesday = at("2017-09-05T15:00:00Z");
    assert!(!full.is_inside(&tuesday));
    assert_eq!(full.next_inside(&tuesday), Some(at("2017-09-06T00:00:00Z")));
}

#[test]
fn test_window_follows_instant_time_zone() {
    let window = DailyWindow::new(
        DayTime::hms(9, 0, 0).unwrap(),
        DayTime::hms(17, 0, 0).unwrap(),
        [true; 7],
    );
    let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();

    // 02:00 UTC is 11:00 in Tokyo.
    let instant = at("2017-09-08T02:00:00Z");
    assert!(!window.is_inside(&instant));
    assert!(window.is_inside(&instant.with_timezone(&tokyo)));
    assert_eq!(
        window.next_outside(&instant.with_timezone(&tokyo)).unwrap().with_timezone(&Utc),
        at("2017-09-08T08:00:00Z")
    );
}

#[tokio::test]
async fn test_working_day_of_usage() {
    let mut config = RuleSetConfig::new("Work");
    config.patterns = vec!["*://*.news.test/*".into()];
    config.quota_allowed = Duration::seconds(90);
    let mut state = RuleSetState::initial(&config);
    let tabs = Focused("https://www.news.test/front");

    // Friday morning, before the window opens.
    let mut now = at("2017-09-08T08:59:00Z");
    let mut blocked_at = None;
    for _ in 0..300 {
        rollover(&now, &mut config, &mut state);
        accrue(&now, &config, &mut state, &tabs).await;
        if blocked_at.is_none() && current_status(&now, &config, &state) == Status::Blocking {
            blocked_at = Some(now);
        }
        now += TimeDelta::seconds(1);
    }

    // 60 inactive seconds, then 90 tracked ones; the last tracked tick
    // already ends in a block.
    assert_eq!(blocked_at, Some(at("2017-09-08T09:01:29Z")));
    assert_eq!(state.quota_used, Duration::seconds(90));
    assert_eq!(state.last_quota_reset, at("2017-09-08T00:00:00Z"));
    assert_eq!(config.quota_reset_anchor, at("2017-09-08T00:00:00Z"));

    let notice = BlockNotice::for_block(&now, Some(tabs.0), &config, &state);
    assert_eq!(notice.unblock_at, Some(at("2017-09-08T17:00:00Z")));
    let decoded = BlockNotice::from_fragment(&notice.to_fragment());
    assert_eq!(decoded, notice);
    assert!(!decoded.is_expired(now));
    assert!(decoded.is_expired(at("2017-09-08T17:00:00Z")));

    // Friday evening the window is closed; Monday the quota is back.
    let evening = at("2017-09-08T17:00:00Z");
    assert_eq!(current_status(&evening, &config, &state), Status::Inactive);
    let monday = at("2017-09-11T09:30:00Z");
    assert!(rollover(&monday, &mut config, &mut state));
    assert_eq!(state.quota_used, Duration::ZERO);
    assert_eq!(current_status(&monday, &config, &state), Status::Tracking);
}

#[test]
fn test_zero_allowance_blocks_whole_window() {
    let mut config = RuleSetConfig::new("Never");
    config.patterns = vec!["<all_urls>".into()];
    config.quota_allowed = Duration::ZERO;
    let state = RuleSetState::initial(&config);

    let mut now = at("2017-09-04T00:00:00Z");
    let end = at("2017-09-11T00:00:00Z");
    while now < end {
        let status = current_status(&now, &config, &state);
        let inside = config.window().is_inside(&now);
        assert_ne!(status, Status::Tracking, "tracking at {now}");
        assert_eq!(status == Status::Blocking, inside, "at {now}");
        now += TimeDelta::minutes(17);
    }

    assert!(affects_url("https://anything.test/", &config, &state));
    let monday = at("2017-09-11T10:00:00Z");
    assert_eq!(
        next_non_blocking_moment(&monday, &config, &state),
        Some(at("2017-09-11T17:00:00Z"))
    );
}

#[test]
fn test_weekly_quota_spans_days() {
    let mut config = RuleSetConfig::new("Weekly");
    config.quota_interval = Duration::days(7);
    config.quota_allowed = Duration::hours(1);
    config.quota_reset_anchor = at("2017-09-04T00:00:00Z");
    let mut state = RuleSetState::initial(&config);
    state.quota_used = Duration::hours(1);

    let wednesday = at("2017-09-06T10:00:00Z");
    assert!(!rollover(&wednesday, &mut config, &mut state));
    assert_eq!(current_status(&wednesday, &config, &state), Status::Blocking);

    // The window closes at 17:00 before the weekly reset.
    assert_eq!(
        next_non_blocking_moment(&wednesday, &config, &state),
        Some(at("2017-09-06T17:00:00Z"))
    );

    let next_monday = at("2017-09-11T09:00:00Z");
    assert!(rollover(&next_monday, &mut config, &mut state));
    assert_eq!(state.last_quota_reset, at("2017-09-11T00:00:00Z"));
    assert_eq!(current_status(&next_monday, &config, &state), Status::Tracking);
}
