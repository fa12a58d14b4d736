use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RuleSetConfig;
use crate::pattern::PatternSet;
use crate::time::Duration;

/// Mutable, persisted per-rule-set usage data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSetState {
    pub quota_used: Duration,
    /// The most recent quota period boundary already accounted for.
    pub last_quota_reset: DateTime<Utc>,
    /// Extra patterns unioned with the configured ones.
    #[serde(default)]
    pub tainted_urls: BTreeSet<String>,
}

impl RuleSetState {
    /// State for a rule set that has never been persisted.
    pub fn initial(config: &RuleSetConfig) -> Self {
        Self {
            quota_used: Duration::ZERO,
            last_quota_reset: config.quota_reset_anchor,
            tainted_urls: BTreeSet::new(),
        }
    }

    /// Configured patterns followed by tainted ones.
    pub fn patterns<'a>(&'a self, config: &'a RuleSetConfig) -> impl Iterator<Item = &'a str> + 'a {
        config
            .patterns
            .iter()
            .map(String::as_str)
            .chain(self.tainted_urls.iter().map(String::as_str))
    }

    /// Compiles [`patterns`](Self::patterns) into one matcher.
    pub fn pattern_set(&self, config: &RuleSetConfig) -> PatternSet {
        PatternSet::new(self.patterns(config))
    }
}
