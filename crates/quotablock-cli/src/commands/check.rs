use std::path::Path;

use chrono::{DateTime, Local, TimeZone};
use quotablock_core::{
    affects_url, current_status, BlockNotice, RuleSetReport, SqliteStore, Status,
    TimeZoneSetting,
};
use serde::Serialize;

use super::{open_store, parse_at, snapshot, time_zone, CliResult};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckOutcome {
    url: String,
    blocked: bool,
    /// Fragment the block page would receive.
    #[serde(skip_serializing_if = "Option::is_none")]
    block_page_fragment: Option<String>,
    /// Rule sets whose patterns match the URL, blocking or not.
    rule_sets: Vec<RuleSetReport>,
}

pub async fn run(db: Option<&Path>, url: &str, at: Option<&str>) -> CliResult {
    let store = open_store(db)?;
    let at = parse_at(at)?;
    let outcome = match time_zone() {
        TimeZoneSetting::Utc => check(&store, url, &at).await?,
        TimeZoneSetting::Local => check(&store, url, &at.with_timezone(&Local)).await?,
    };
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn check<Tz: TimeZone>(
    store: &SqliteStore,
    url: &str,
    now: &DateTime<Tz>,
) -> CliResult<CheckOutcome> {
    let matching: Vec<_> = snapshot(store, now)
        .await?
        .into_iter()
        .filter(|(config, state)| affects_url(url, config, state))
        .collect();

    let notice = matching
        .iter()
        .find(|(config, state)| current_status(now, config, state) == Status::Blocking)
        .map(|(config, state)| BlockNotice::for_block(now, Some(url), config, state));

    Ok(CheckOutcome {
        url: url.to_string(),
        blocked: notice.is_some(),
        block_page_fragment: notice.as_ref().map(BlockNotice::to_fragment),
        rule_sets: matching
            .iter()
            .map(|(config, state)| RuleSetReport::new(now, config, state))
            .collect(),
    })
}
