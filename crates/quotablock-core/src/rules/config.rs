use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigError, ValidationError};
use crate::pattern::MatchPattern;
use crate::time::{DailyWindow, DayTime, Duration, Period, WeekDays};

/// Unique identifier for a rule set.
pub type RuleSetId = String;

/// One independently configured blocking policy.
///
/// Edited by the configuration layer. The engine only ever touches
/// `quota_reset_anchor`, which quota rollover ratchets forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSetConfig {
    pub id: RuleSetId,
    pub name: String,
    #[serde(default)]
    pub patterns: Vec<String>,
    pub start_time: DayTime,
    pub end_time: DayTime,
    pub days: WeekDays,
    pub quota_interval: Duration,
    pub quota_reset_anchor: DateTime<Utc>,
    pub quota_allowed: Duration,
}

impl Default for RuleSetConfig {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: String::new(),
            patterns: Vec::new(),
            start_time: DayTime::hms(9, 0, 0).unwrap_or(DayTime::MIDNIGHT),
            end_time: DayTime::hms(17, 0, 0).unwrap_or(DayTime::END_OF_DAY),
            days: [false, true, true, true, true, true, false],
            quota_interval: Duration::days(1),
            quota_reset_anchor: Utc
                .with_ymd_and_hms(2017, 9, 14, 0, 0, 0)
                .single()
                .unwrap_or_default(),
            quota_allowed: Duration::minutes(10),
        }
    }
}

impl RuleSetConfig {
    /// A fresh rule set with a random id and the default schedule.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn window(&self) -> DailyWindow {
        DailyWindow::new(self.start_time, self.end_time, self.days)
    }

    /// The quota interval as a period.
    ///
    /// Only validated configs reach the engine; an invalid interval falls
    /// back to one day rather than panicking.
    pub fn period(&self) -> Period {
        Period::try_from(self.quota_interval).unwrap_or_else(|_| Period::one_day())
    }

    /// Checks every field the engine relies on.
    ///
    /// # Errors
    /// Returns the first problem found: a window spanning midnight, a
    /// non-positive quota interval or a malformed URL pattern.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "id".into(),
                message: "must not be empty".into(),
            });
        }
        if self.start_time > self.end_time {
            return Err(ValidationError::WindowSpansMidnight {
                start: self.start_time.to_string(),
                end: self.end_time.to_string(),
            });
        }
        Period::try_from(self.quota_interval)?;
        for pattern in &self.patterns {
            MatchPattern::parse(pattern)?;
        }
        Ok(())
    }

    /// [`validate`](Self::validate), wrapped with the rule set's identity.
    pub fn validated(self) -> Result<Self, ConfigError> {
        match self.validate() {
            Ok(()) => Ok(self),
            Err(source) => Err(ConfigError::InvalidRuleSet {
                rule_set: self.display_name().to_string(),
                source,
            }),
        }
    }

    /// The name, or the id when the name is blank.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example() -> RuleSetConfig {
        RuleSetConfig {
            id: "cee7cf25-6513-4281-9e32-9ed464d96614".into(),
            name: "My block set".into(),
            patterns: vec!["*://does-not-exist.com/*".into(), "*://www.heise.de/*".into()],
            start_time: DayTime::MIDNIGHT,
            end_time: DayTime::END_OF_DAY,
            days: [true; 7],
            quota_interval: Duration::days(7),
            quota_reset_anchor: "2017-09-14T10:27:22Z".parse().unwrap(),
            quota_allowed: "PT1H30M".parse().unwrap(),
        }
    }

    #[test]
    fn default_matches_working_hours() {
        let cfg = RuleSetConfig::new("Work");
        assert_eq!(cfg.name, "Work");
        assert_eq!(cfg.start_time.to_string(), "09:00:00");
        assert_eq!(cfg.end_time.to_string(), "17:00:00");
        assert_eq!(cfg.days, [false, true, true, true, true, true, false]);
        assert_eq!(cfg.quota_allowed, Duration::minutes(10));
        assert_eq!(cfg.quota_reset_anchor.to_rfc3339(), "2017-09-14T00:00:00+00:00");
        assert!(Uuid::parse_str(&cfg.id).is_ok());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn example_validates_and_roundtrips() {
        let cfg = example();
        assert!(cfg.validate().is_ok());
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"quotaResetAnchor\""));
        assert!(json.contains("\"quotaAllowed\":\"PT1H30M\""));
        let back: RuleSetConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn rejects_window_spanning_midnight() {
        let mut cfg = example();
        cfg.start_time = DayTime::hms(22, 0, 0).unwrap();
        cfg.end_time = DayTime::hms(6, 0, 0).unwrap();
        assert!(matches!(cfg.validate(), Err(ValidationError::WindowSpansMidnight { .. })));
    }

    #[test]
    fn rejects_zero_interval() {
        let mut cfg = example();
        cfg.quota_interval = Duration::ZERO;
        assert_eq!(cfg.validate(), Err(ValidationError::NonPositivePeriod));
    }

    #[test]
    fn rejects_malformed_pattern() {
        let mut cfg = example();
        cfg.patterns.push("heise.de".into());
        assert_eq!(cfg.validate(), Err(ValidationError::InvalidPattern("heise.de".into())));
        let err = cfg.validated().unwrap_err();
        assert!(err.to_string().contains("My block set"));
    }

    #[test]
    fn malformed_fields_fail_to_deserialize() {
        let mut json = serde_json::to_value(example()).unwrap();
        json["startTime"] = "9 o'clock".into();
        assert!(serde_json::from_value::<RuleSetConfig>(json).is_err());

        let mut json = serde_json::to_value(example()).unwrap();
        json["quotaInterval"] = "P1Y".into();
        assert!(serde_json::from_value::<RuleSetConfig>(json).is_err());
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let mut cfg = example();
        cfg.name = "   ".into();
        assert_eq!(cfg.display_name(), cfg.id);
    }
}
