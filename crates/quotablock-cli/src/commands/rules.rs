//! Rule set management commands for CLI.

use std::path::Path;

use chrono::{DateTime, Local, TimeZone, Utc, Weekday};
use clap::Subcommand;
use quotablock_core::time::WeekDays;
use quotablock_core::{
    CoreError, MatchPattern, RuleSetConfig, RuleSetReport, RuleSetState, StateStore,
    TimeZoneSetting,
};
use serde_json::json;

use super::{as_of, open_store, parse_at, time_zone, CliResult};

#[derive(Subcommand)]
pub enum RulesAction {
    /// Create a new rule set
    Add {
        /// Rule set name
        name: String,
        /// URL match pattern (repeatable), e.g. "*://*.example.com/*"
        #[arg(long = "pattern")]
        patterns: Vec<String>,
        /// Daily window start (HH:mm:ss)
        #[arg(long, default_value = "09:00:00")]
        start: String,
        /// Daily window end (HH:mm:ss, 24:00:00 for end of day)
        #[arg(long, default_value = "17:00:00")]
        end: String,
        /// Active days: comma-separated names, "weekdays", "weekend", "all" or "none"
        #[arg(long, default_value = "weekdays")]
        days: String,
        /// Quota period as ISO 8601 duration
        #[arg(long, default_value = "P1D")]
        interval: String,
        /// Allowed usage per period as ISO 8601 duration
        #[arg(long, default_value = "PT10M")]
        allowed: String,
        /// Instant quota periods are counted from (RFC 3339)
        #[arg(long)]
        anchor: Option<String>,
    },
    /// List all rule sets
    List,
    /// Show a rule set with its usage
    Show {
        /// Rule set ID
        id: String,
        /// Evaluate at this RFC 3339 instant instead of now
        #[arg(long)]
        at: Option<String>,
    },
    /// Delete a rule set and its usage
    Remove {
        /// Rule set ID
        id: String,
    },
    /// Add an extra URL pattern to a rule set's usage state
    Taint {
        /// Rule set ID
        id: String,
        /// URL match pattern
        pattern: String,
    },
}

pub async fn run(db: Option<&Path>, action: RulesAction) -> CliResult {
    let store = open_store(db)?;

    match action {
        RulesAction::Add {
            name,
            patterns,
            start,
            end,
            days,
            interval,
            allowed,
            anchor,
        } => {
            let mut config = RuleSetConfig::new(name);
            config.patterns = patterns;
            config.start_time = start.parse()?;
            config.end_time = end.parse()?;
            config.days = parse_days(&days)?;
            config.quota_interval = interval.parse()?;
            config.quota_allowed = allowed.parse()?;
            if let Some(anchor) = anchor {
                config.quota_reset_anchor = DateTime::parse_from_rfc3339(&anchor)
                    .map_err(|e| format!("invalid anchor '{anchor}': {e}"))?
                    .with_timezone(&Utc);
            }
            let config = config.validated()?;

            store.persist_rule_set(&config).await?;
            store
                .persist_state(&config.id, &RuleSetState::initial(&config))
                .await?;
            println!("Rule set created: {}", config.id);
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        RulesAction::List => {
            let configs = store.load_rule_sets().await?;
            println!("{}", serde_json::to_string_pretty(&configs)?);
        }
        RulesAction::Show { id, at } => {
            let at = parse_at(at.as_deref())?;
            let config = find(&store, &id).await?;
            let state = store
                .load_state(&id)
                .await?
                .unwrap_or_else(|| RuleSetState::initial(&config));
            let out = match time_zone() {
                TimeZoneSetting::Utc => show(&at, config, state),
                TimeZoneSetting::Local => show(&at.with_timezone(&Local), config, state),
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        RulesAction::Remove { id } => {
            if !store.remove_rule_set(&id).await? {
                return Err(CoreError::UnknownRuleSet(id).into());
            }
            println!("Rule set removed: {id}");
        }
        RulesAction::Taint { id, pattern } => {
            MatchPattern::parse(&pattern)?;
            let config = find(&store, &id).await?;
            let mut state = store
                .load_state(&id)
                .await?
                .unwrap_or_else(|| RuleSetState::initial(&config));
            if state.tainted_urls.insert(pattern.clone()) {
                store.persist_state(&id, &state).await?;
            }
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
    }
    Ok(())
}

fn show<Tz: TimeZone>(
    now: &DateTime<Tz>,
    config: RuleSetConfig,
    state: RuleSetState,
) -> serde_json::Value {
    let (config, state) = as_of(now, config, state);
    let report = RuleSetReport::new(now, &config, &state);
    json!({
        "config": config,
        "state": state,
        "report": report,
    })
}

async fn find<S: StateStore>(store: &S, id: &str) -> Result<RuleSetConfig, CoreError> {
    store
        .load_rule_sets()
        .await?
        .into_iter()
        .find(|config| config.id == id)
        .ok_or_else(|| CoreError::UnknownRuleSet(id.to_string()))
}

/// Parses "mon,wed,fri", "weekdays", "weekend", "all" or "none".
fn parse_days(raw: &str) -> Result<WeekDays, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "all" => return Ok([true; 7]),
        "none" => return Ok([false; 7]),
        "weekdays" => return Ok([false, true, true, true, true, true, false]),
        "weekend" => return Ok([true, false, false, false, false, false, true]),
        _ => {}
    }

    let mut days = [false; 7];
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let day: Weekday = part
            .parse()
            .map_err(|_| format!("invalid day '{part}'"))?;
        days[day.num_days_from_sunday() as usize] = true;
    }
    Ok(days)
}
