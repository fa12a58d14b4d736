//! Browser-side collaborators.
//!
//! The engine never talks to a browser directly. A host (extension bridge,
//! native messaging shim, test double) implements these traits.

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TabQueryError;
use crate::notice::BlockNotice;

pub type TabId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    pub url: Option<String>,
}

#[async_trait]
pub trait BrowserTabs: Send + Sync {
    /// URL of the active tab in the focused window, if any.
    async fn active_url(&self) -> Result<Option<String>, TabQueryError>;

    /// Every open tab in normal windows.
    async fn all_tabs(&self) -> Result<Vec<Tab>, TabQueryError>;

    async fn all_urls(&self) -> Result<Vec<String>, TabQueryError> {
        Ok(self
            .all_tabs()
            .await?
            .into_iter()
            .filter_map(|tab| tab.url)
            .collect())
    }
}

#[async_trait]
pub trait BlockPage: Send + Sync {
    /// Replace the tab's location with the block page for `notice`.
    async fn redirect(&self, tab_id: TabId, notice: &BlockNotice) -> Result<(), TabQueryError>;
}

/// Wraps a [`BrowserTabs`] so every query fails with
/// [`TabQueryError::Timeout`] if it does not resolve within `timeout`.
pub struct TimeoutTabs<'a, B: ?Sized> {
    inner: &'a B,
    timeout: StdDuration,
}

impl<'a, B: BrowserTabs + ?Sized> TimeoutTabs<'a, B> {
    pub fn new(inner: &'a B, timeout: StdDuration) -> Self {
        Self { inner, timeout }
    }

    fn elapsed(&self) -> TabQueryError {
        TabQueryError::Timeout {
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }
}

#[async_trait]
impl<'a, B: BrowserTabs + ?Sized> BrowserTabs for TimeoutTabs<'a, B> {
    async fn active_url(&self) -> Result<Option<String>, TabQueryError> {
        tokio::time::timeout(self.timeout, self.inner.active_url())
            .await
            .map_err(|_| self.elapsed())?
    }

    async fn all_tabs(&self) -> Result<Vec<Tab>, TabQueryError> {
        tokio::time::timeout(self.timeout, self.inner.all_tabs())
            .await
            .map_err(|_| self.elapsed())?
    }
}
