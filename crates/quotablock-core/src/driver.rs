//! Periodic tick loop and navigation handler.
//!
//! The driver owns the in-memory copy of every rule set and its state. Each
//! tick it rolls quota periods over, samples the focused tab, redirects tabs
//! of rule sets that just started blocking and writes back whatever changed.
//! Ticks are strictly sequential: [`Driver::tick`] takes `&mut self`.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration as StdDuration;

use chrono::{DateTime, TimeZone, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::time::MissedTickBehavior;

use crate::browser::{BlockPage, BrowserTabs, TabId, TimeoutTabs};
use crate::error::{CoreError, StorageError, TabQueryError};
use crate::notice::BlockNotice;
use crate::pattern::{MatchPattern, PatternSet};
use crate::rules::{
    accrue_matching, current_status, next_non_blocking_moment, rollover, RuleSetConfig,
    RuleSetId, RuleSetState, Status,
};
use crate::storage::{Settings, StateStore};
use crate::time::Duration;

/// Default bound on a single tab query.
pub const DEFAULT_LOOKUP_TIMEOUT: StdDuration = StdDuration::from_millis(800);

/// Default pause between ticks of [`Driver::run`].
pub const DEFAULT_TICK_INTERVAL: StdDuration = StdDuration::from_secs(1);

/// Point-in-time view of one rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSetReport {
    pub id: RuleSetId,
    pub name: String,
    pub status: Status,
    /// `None` when the block cannot end under the current configuration.
    pub next_non_blocking: Option<DateTime<Utc>>,
    pub quota_used: Duration,
    pub quota_allowed: Duration,
    pub last_quota_reset: DateTime<Utc>,
}

impl RuleSetReport {
    pub fn new<Tz: TimeZone>(now: &DateTime<Tz>, config: &RuleSetConfig, state: &RuleSetState) -> Self {
        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            status: current_status(now, config, state),
            next_non_blocking: next_non_blocking_moment(now, config, state)
                .map(|t| t.with_timezone(&Utc)),
            quota_used: state.quota_used,
            quota_allowed: config.quota_allowed,
            last_quota_reset: state.last_quota_reset,
        }
    }
}

/// What a tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub resets: usize,
    pub accrued: usize,
    pub newly_blocking: usize,
    pub redirected: usize,
    pub persist_failures: usize,
}

#[derive(Debug)]
struct Entry {
    config: RuleSetConfig,
    state: RuleSetState,
    /// Configured and tainted patterns, compiled.
    patterns: PatternSet,
    last_status: Option<Status>,
    config_dirty: bool,
    state_dirty: bool,
}

impl Entry {
    fn new(config: RuleSetConfig, state: RuleSetState, state_dirty: bool) -> Self {
        let patterns = state.pattern_set(&config);
        Self {
            config,
            state,
            patterns,
            last_status: None,
            config_dirty: false,
            state_dirty,
        }
    }

    /// Must follow every change to the config's or the state's patterns.
    fn recompile_patterns(&mut self) {
        self.patterns = self.state.pattern_set(&self.config);
    }

    fn is_dirty(&self) -> bool {
        self.config_dirty || self.state_dirty
    }
}

pub struct Driver<B, S, P> {
    tabs: B,
    store: S,
    block_page: P,
    tick_interval: StdDuration,
    lookup_timeout: StdDuration,
    entries: Vec<Entry>,
}

impl<B, S, P> Driver<B, S, P>
where
    B: BrowserTabs,
    S: StateStore,
    P: BlockPage,
{
    /// Loads every stored rule set and its state.
    ///
    /// Rule sets that fail validation are logged and skipped. A missing
    /// state is synthesized from the config and written on the first tick.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub async fn load(tabs: B, store: S, block_page: P) -> Result<Self, StorageError> {
        let mut entries = Vec::new();
        for config in store.load_rule_sets().await? {
            if let Some(entry) = load_entry(&store, config).await? {
                entries.push(entry);
            }
        }

        tracing::info!(rule_sets = entries.len(), "driver loaded");
        Ok(Self {
            tabs,
            store,
            block_page,
            tick_interval: DEFAULT_TICK_INTERVAL,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            entries,
        })
    }

    /// Picks up rule sets added, edited or removed in the store since the
    /// last load.
    ///
    /// In-memory usage state of surviving rule sets is kept, as is an anchor
    /// advance that has not been written yet.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read; the loaded rule sets
    /// are left as they were.
    pub async fn reload(&mut self) -> Result<(), StorageError> {
        let configs = self.store.load_rule_sets().await?;
        let mut known: HashMap<RuleSetId, Entry> = self
            .entries
            .drain(..)
            .map(|entry| (entry.config.id.clone(), entry))
            .collect();

        let mut entries = Vec::with_capacity(configs.len());
        for config in configs {
            match known.remove(&config.id) {
                Some(mut entry) => match config.validated() {
                    Ok(mut config) => {
                        if entry.config_dirty {
                            config.quota_reset_anchor =
                                config.quota_reset_anchor.max(entry.config.quota_reset_anchor);
                        }
                        entry.config = config;
                        entry.recompile_patterns();
                        entries.push(entry);
                    }
                    Err(err) => tracing::warn!(error = %err, "dropping rule set after invalid edit"),
                },
                None => match load_entry(&self.store, config).await {
                    Ok(Some(entry)) => entries.push(entry),
                    Ok(None) => {}
                    Err(err) => tracing::warn!(error = %err, "could not load new rule set"),
                },
            }
        }

        for id in known.keys() {
            tracing::info!(rule_set = %id, "rule set removed");
        }
        tracing::debug!(rule_sets = entries.len(), "driver reloaded");
        self.entries = entries;
        Ok(())
    }

    /// Applies the `[driver]` settings: tick interval and tab lookup
    /// timeout.
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.tick_interval = settings.tick_interval();
        self.lookup_timeout = settings.lookup_timeout();
        self
    }

    pub fn tick_interval(&self) -> StdDuration {
        self.tick_interval
    }

    pub fn lookup_timeout(&self) -> StdDuration {
        self.lookup_timeout
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn rule_sets(&self) -> impl Iterator<Item = (&RuleSetConfig, &RuleSetState)> {
        self.entries.iter().map(|entry| (&entry.config, &entry.state))
    }

    /// Whether some change has not reached the store yet.
    pub fn has_unsaved_changes(&self) -> bool {
        self.entries.iter().any(Entry::is_dirty)
    }

    /// One pass of the loop.
    pub async fn tick<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> TickSummary {
        let mut summary = TickSummary::default();
        let tabs = TimeoutTabs::new(&self.tabs, self.lookup_timeout);
        let tabs = &tabs;

        let outcomes = join_all(self.entries.iter_mut().map(|entry| async move {
            let reset = rollover(now, &mut entry.config, &mut entry.state);
            if reset {
                tracing::info!(rule_set = %entry.config.id, reset_at = %entry.state.last_quota_reset, "quota reset");
                entry.config_dirty = true;
                entry.state_dirty = true;
            }
            let accrued =
                accrue_matching(now, &entry.config, &mut entry.state, &entry.patterns, tabs).await;
            if accrued {
                entry.state_dirty = true;
            }
            (reset, accrued)
        }))
        .await;
        for (reset, accrued) in outcomes {
            summary.resets += usize::from(reset);
            summary.accrued += usize::from(accrued);
        }

        let mut newly_blocking = Vec::new();
        for (index, entry) in self.entries.iter_mut().enumerate() {
            let status = current_status(now, &entry.config, &entry.state);
            let previous = entry.last_status.replace(status);
            if previous != Some(status) {
                tracing::debug!(rule_set = %entry.config.id, ?previous, %status, "status changed");
            }
            if status == Status::Blocking && previous != Some(Status::Blocking) {
                newly_blocking.push(index);
            }
        }
        summary.newly_blocking = newly_blocking.len();
        if !newly_blocking.is_empty() {
            summary.redirected = self.block_open_tabs(now, &newly_blocking).await;
        }

        summary.persist_failures = self.persist_dirty().await;
        summary
    }

    /// Redirects every open tab affected by one of `indices`. Returns the
    /// number of successful redirects.
    async fn block_open_tabs<Tz: TimeZone>(&self, now: &DateTime<Tz>, indices: &[usize]) -> usize {
        let tabs = TimeoutTabs::new(&self.tabs, self.lookup_timeout);
        let open = match tabs.all_tabs().await {
            Ok(open) => open,
            Err(err) => {
                tracing::warn!(error = %err, "could not list tabs to block");
                return 0;
            }
        };

        let mut redirected = 0;
        for tab in open {
            let Some(url) = tab.url.as_deref() else {
                continue;
            };
            let hit = indices
                .iter()
                .map(|&index| &self.entries[index])
                .find(|entry| entry.patterns.matches(url));
            if let Some(entry) = hit {
                let notice = BlockNotice::for_block(now, Some(url), &entry.config, &entry.state);
                if self.redirect(tab.id, &notice).await.is_ok() {
                    redirected += 1;
                }
            }
        }
        redirected
    }

    async fn redirect(&self, tab_id: TabId, notice: &BlockNotice) -> Result<(), TabQueryError> {
        match self.block_page.redirect(tab_id, notice).await {
            Ok(()) => {
                tracing::info!(tab_id, rule_set = ?notice.rule_set_name, "tab blocked");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(tab_id, error = %err, "redirect failed");
                Err(err)
            }
        }
    }

    /// Writes changed configs and states. Failed writes stay dirty and are
    /// retried next tick. Returns the number of failed writes.
    async fn persist_dirty(&mut self) -> usize {
        let mut failures = 0;
        for entry in self.entries.iter_mut().filter(|entry| entry.is_dirty()) {
            if entry.config_dirty {
                match self.store.persist_rule_set(&entry.config).await {
                    Ok(()) => entry.config_dirty = false,
                    Err(err) => {
                        failures += 1;
                        tracing::warn!(rule_set = %entry.config.id, error = %err, "persisting rule set failed");
                    }
                }
            }
            if entry.state_dirty {
                match self.store.persist_state(&entry.config.id, &entry.state).await {
                    Ok(()) => entry.state_dirty = false,
                    Err(err) => {
                        failures += 1;
                        tracing::warn!(rule_set = %entry.config.id, error = %err, "persisting state failed");
                    }
                }
            }
        }
        failures
    }

    /// Handles a tab navigating to `url`.
    ///
    /// Redirects the tab if a blocking rule set affects the URL; the first
    /// such rule set in load order supplies the notice.
    pub async fn on_url_changed<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        tab_id: TabId,
        url: &str,
    ) -> Result<Option<BlockNotice>, TabQueryError> {
        let hit = self.entries.iter().find(|entry| {
            entry.patterns.matches(url)
                && current_status(now, &entry.config, &entry.state) == Status::Blocking
        });
        let Some(entry) = hit else {
            return Ok(None);
        };

        let notice = BlockNotice::for_block(now, Some(url), &entry.config, &entry.state);
        self.redirect(tab_id, &notice).await?;
        Ok(Some(notice))
    }

    pub fn statuses<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<RuleSetReport> {
        self.entries
            .iter()
            .map(|entry| RuleSetReport::new(now, &entry.config, &entry.state))
            .collect()
    }

    /// Adds `pattern` to a rule set's tainted URLs. Persisted on the next tick.
    ///
    /// # Errors
    /// Returns an error for an unknown rule set or a malformed pattern.
    pub fn taint_url(&mut self, rule_set_id: &str, pattern: &str) -> Result<bool, CoreError> {
        MatchPattern::parse(pattern)?;
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.config.id == rule_set_id)
            .ok_or_else(|| CoreError::UnknownRuleSet(rule_set_id.to_string()))?;

        let added = entry.state.tainted_urls.insert(pattern.to_string());
        if added {
            entry.recompile_patterns();
            entry.state_dirty = true;
            tracing::debug!(rule_set = %rule_set_id, %pattern, "url tainted");
        }
        Ok(added)
    }

    /// Ticks every [`tick_interval`](Self::tick_interval) until `shutdown`
    /// resolves, then makes a last attempt to persist pending changes.
    ///
    /// Ticks that would overlap a slow predecessor are skipped.
    pub async fn run<Tz, C, F>(&mut self, clock: C, shutdown: F)
    where
        Tz: TimeZone,
        C: Fn() -> DateTime<Tz>,
        F: Future<Output = ()>,
    {
        let interval = self.tick_interval;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        tracing::info!(interval_ms = interval.as_millis() as u64, "driver started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let now = clock();
                    self.tick(&now).await;
                }
            }
        }

        let failures = self.persist_dirty().await;
        if failures > 0 {
            tracing::error!(failures, "unsaved changes at shutdown");
        }
        tracing::info!("driver stopped");
    }
}

/// Validates `config` and pairs it with its stored state, or a fresh one.
/// Invalid rule sets yield `None`.
async fn load_entry<S: StateStore>(store: &S, config: RuleSetConfig) -> Result<Option<Entry>, StorageError> {
    let config = match config.validated() {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(error = %err, "skipping invalid rule set");
            return Ok(None);
        }
    };

    let (state, state_dirty) = match store.load_state(&config.id).await {
        Ok(Some(state)) => (state, false),
        Ok(None) => (RuleSetState::initial(&config), true),
        Err(StorageError::Corrupt { key, source }) => {
            tracing::warn!(%key, error = %source, "discarding undecodable state");
            (RuleSetState::initial(&config), true)
        }
        Err(err) => return Err(err),
    };

    Ok(Some(Entry::new(config, state, state_dirty)))
}
