use std::path::Path;

use chrono::{DateTime, Local, TimeZone};
use quotablock_core::{RuleSetReport, SqliteStore, TimeZoneSetting};

use super::{open_store, parse_at, snapshot, time_zone, CliResult};

pub async fn run(db: Option<&Path>, at: Option<&str>) -> CliResult {
    let store = open_store(db)?;
    let at = parse_at(at)?;
    let reports = match time_zone() {
        TimeZoneSetting::Utc => reports(&store, &at).await?,
        TimeZoneSetting::Local => reports(&store, &at.with_timezone(&Local)).await?,
    };
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

async fn reports<Tz: TimeZone>(store: &SqliteStore, now: &DateTime<Tz>) -> CliResult<Vec<RuleSetReport>> {
    Ok(snapshot(store, now)
        .await?
        .iter()
        .map(|(config, state)| RuleSetReport::new(now, config, state))
        .collect())
}
