//! Subcommands and the helpers they share.

pub mod check;
pub mod config;
pub mod rules;
pub mod status;

use std::error::Error;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use quotablock_core::{
    rollover, RuleSetConfig, RuleSetState, Settings, SqliteStore, StateStore, StorageError,
    TimeZoneSetting,
};

pub type CliResult<T = ()> = Result<T, Box<dyn Error>>;

pub fn open_store(db: Option<&Path>) -> Result<SqliteStore, StorageError> {
    match db {
        Some(path) => SqliteStore::open_path(path),
        None => SqliteStore::open(),
    }
}

/// `--at` as an instant, or the current time.
pub fn parse_at(at: Option<&str>) -> CliResult<DateTime<Utc>> {
    match at {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| format!("invalid instant '{raw}': {e}").into()),
        None => Ok(Utc::now()),
    }
}

/// Every valid rule set with its state as of `now`.
///
/// Pending quota resets are applied to the returned copies only; the store
/// is left untouched.
pub async fn snapshot<Tz: TimeZone>(
    store: &SqliteStore,
    now: &DateTime<Tz>,
) -> Result<Vec<(RuleSetConfig, RuleSetState)>, StorageError> {
    let mut out = Vec::new();
    for config in store.load_rule_sets().await? {
        let config = match config.validated() {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(error = %err, "skipping invalid rule set");
                continue;
            }
        };
        let state = store
            .load_state(&config.id)
            .await?
            .unwrap_or_else(|| RuleSetState::initial(&config));
        out.push(as_of(now, config, state));
    }
    Ok(out)
}

/// A rule set as the driver would see it at `now`, with any pending quota
/// reset applied.
pub fn as_of<Tz: TimeZone>(
    now: &DateTime<Tz>,
    mut config: RuleSetConfig,
    mut state: RuleSetState,
) -> (RuleSetConfig, RuleSetState) {
    rollover(now, &mut config, &mut state);
    (config, state)
}

/// The zone daily windows are evaluated in.
pub fn time_zone() -> TimeZoneSetting {
    Settings::load_or_default().clock.time_zone
}
