//! Block page notice.
//!
//! A blocked tab is sent to the block page with a URL fragment of the form
//! `#<blocked url>#<unblock instant>#<rule set name>`, each part
//! percent-encoded. An empty part means "unknown".

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::rules::{next_non_blocking_moment, RuleSetConfig, RuleSetState};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockNotice {
    pub blocked_url: Option<String>,
    /// `None` when the block cannot end under the current configuration.
    pub unblock_at: Option<DateTime<Utc>>,
    pub rule_set_name: Option<String>,
}

impl BlockNotice {
    /// Notice for `url`, blocked by `config` at `now`.
    pub fn for_block<Tz: TimeZone>(
        now: &DateTime<Tz>,
        url: Option<&str>,
        config: &RuleSetConfig,
        state: &RuleSetState,
    ) -> Self {
        Self {
            blocked_url: url.map(String::from),
            unblock_at: next_non_blocking_moment(now, config, state).map(|t| t.with_timezone(&Utc)),
            rule_set_name: Some(config.display_name().to_string()),
        }
    }

    /// Encodes the notice as a fragment, leading `#` included.
    pub fn to_fragment(&self) -> String {
        let url = self.blocked_url.as_deref().unwrap_or_default();
        let at = self
            .unblock_at
            .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
            .unwrap_or_default();
        let name = self.rule_set_name.as_deref().unwrap_or_default();
        format!(
            "#{}#{}#{}",
            urlencoding::encode(url),
            urlencoding::encode(&at),
            urlencoding::encode(name)
        )
    }

    /// Decodes a fragment produced by [`to_fragment`](Self::to_fragment).
    ///
    /// Tolerant: missing, undecodable or unparsable parts become `None`.
    pub fn from_fragment(fragment: &str) -> Self {
        let mut parts = fragment.strip_prefix('#').unwrap_or(fragment).splitn(3, '#');
        let mut next = || {
            parts
                .next()
                .filter(|part| !part.is_empty())
                .and_then(|part| urlencoding::decode(part).ok())
                .map(|part| part.into_owned())
        };

        let blocked_url = next();
        let unblock_at = next().and_then(|at| {
            DateTime::parse_from_rfc3339(&at)
                .ok()
                .map(|t| t.with_timezone(&Utc))
        });
        let rule_set_name = next();

        Self {
            blocked_url,
            unblock_at,
            rule_set_name,
        }
    }

    /// Whether the block has ended, so the page should send the user back.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.unblock_at, Some(at) if at <= now)
    }

    /// Where the block page should navigate once expired.
    pub fn return_url(&self, now: DateTime<Utc>) -> Option<&str> {
        if self.is_expired(now) {
            self.blocked_url.as_deref()
        } else {
            None
        }
    }
}
