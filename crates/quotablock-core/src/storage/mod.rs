//! Persistence for rule sets and their usage state.
//!
//! Both stores are plain key-value tables. Configs live under
//! `rule_set:<id>`, states under `rule_set_state:<id>`, and `rule_sets` holds
//! the ordered list of ids. [`StateStore`] is implemented once on top of
//! [`KvStore`].

mod memory;
mod settings;
mod sqlite;

pub use memory::MemoryStore;
pub use settings::{Settings, TimeZoneSetting};
pub use sqlite::SqliteStore;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;
use crate::rules::{RuleSetConfig, RuleSetState};

const INDEX_KEY: &str = "rule_sets";

fn config_key(id: &str) -> String {
    format!("rule_set:{id}")
}

fn state_key(id: &str) -> String {
    format!("rule_set_state:{id}")
}

/// Returns `~/.config/quotablock[-dev]/` based on QUOTABLOCK_ENV.
///
/// Set QUOTABLOCK_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("QUOTABLOCK_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("quotablock-dev")
    } else {
        base_dir.join("quotablock")
    };

    std::fs::create_dir_all(&dir).map_err(StorageError::DataDir)?;
    Ok(dir)
}

/// String key-value backend.
pub trait KvStore: Send + Sync {
    fn kv_get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn kv_set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Returns whether the key existed.
    fn kv_delete(&self, key: &str) -> Result<bool, StorageError>;
}

/// Where the driver and the CLI read and write rule sets.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// All stored rule sets in insertion order. Entries that fail to decode
    /// are logged and skipped.
    async fn load_rule_sets(&self) -> Result<Vec<RuleSetConfig>, StorageError>;

    /// Inserts or replaces a rule set, keyed by its id.
    async fn persist_rule_set(&self, config: &RuleSetConfig) -> Result<(), StorageError>;

    /// Removes a rule set and its state. Returns whether it existed.
    async fn remove_rule_set(&self, id: &str) -> Result<bool, StorageError>;

    async fn load_state(&self, id: &str) -> Result<Option<RuleSetState>, StorageError>;

    async fn persist_state(&self, id: &str, state: &RuleSetState) -> Result<(), StorageError>;
}

fn get_json<K: KvStore + ?Sized, T: DeserializeOwned>(
    kv: &K,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match kv.kv_get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

fn set_json<K: KvStore + ?Sized, T: Serialize>(
    kv: &K,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    kv.kv_set(key, &raw)
}

fn index<K: KvStore + ?Sized>(kv: &K) -> Result<Vec<String>, StorageError> {
    Ok(get_json(kv, INDEX_KEY)?.unwrap_or_default())
}

#[async_trait]
impl<K: KvStore> StateStore for K {
    async fn load_rule_sets(&self) -> Result<Vec<RuleSetConfig>, StorageError> {
        let mut configs = Vec::new();
        for id in index(self)? {
            match get_json::<_, RuleSetConfig>(self, &config_key(&id)) {
                Ok(Some(config)) => configs.push(config),
                Ok(None) => tracing::warn!(rule_set = %id, "indexed rule set is missing"),
                Err(StorageError::Corrupt { key, source }) => {
                    tracing::warn!(%key, error = %source, "skipping undecodable rule set");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(configs)
    }

    async fn persist_rule_set(&self, config: &RuleSetConfig) -> Result<(), StorageError> {
        set_json(self, &config_key(&config.id), config)?;
        let mut ids = index(self)?;
        if !ids.contains(&config.id) {
            ids.push(config.id.clone());
            set_json(self, INDEX_KEY, &ids)?;
        }
        tracing::debug!(rule_set = %config.id, "rule set persisted");
        Ok(())
    }

    async fn remove_rule_set(&self, id: &str) -> Result<bool, StorageError> {
        let mut ids = index(self)?;
        let indexed = ids.iter().any(|known| known == id);
        if indexed {
            ids.retain(|known| known != id);
            set_json(self, INDEX_KEY, &ids)?;
        }
        let existed = self.kv_delete(&config_key(id))?;
        self.kv_delete(&state_key(id))?;
        Ok(indexed || existed)
    }

    async fn load_state(&self, id: &str) -> Result<Option<RuleSetState>, StorageError> {
        get_json(self, &state_key(id))
    }

    async fn persist_state(&self, id: &str, state: &RuleSetState) -> Result<(), StorageError> {
        set_json(self, &state_key(id), state)
    }
}
