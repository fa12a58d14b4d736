//! TOML-based runtime settings.
//!
//! Rule sets live in the state store; this file only tunes the driver:
//! - Tick interval and tab lookup timeout
//! - Which time zone daily windows are evaluated in
//!
//! Settings are stored at `~/.config/quotablock/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{ConfigError, CoreError};

/// Driver timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverSettings {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Bound on each browser tab query made during a tick.
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeZoneSetting {
    #[default]
    Local,
    Utc,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSettings {
    #[serde(default)]
    pub time_zone: TimeZoneSetting,
}

/// Serialized to/from TOML at `~/.config/quotablock/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub driver: DriverSettings,
    #[serde(default)]
    pub clock: ClockSettings,
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_lookup_timeout_ms() -> u64 {
    800
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
        }
    }
}

impl Settings {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }
        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let (parent, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };
        if leaf.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        if let Some(parent) = parent {
            for part in parent.split('.') {
                current = current.get_mut(part).ok_or_else(unknown)?;
            }
        }
        let obj = current.as_object_mut().ok_or_else(unknown)?;
        let existing = obj.get(leaf).ok_or_else(unknown)?;

        let new_value = match existing {
            serde_json::Value::Number(_) => value
                .parse::<u64>()
                .map(|n| serde_json::Value::Number(n.into()))
                .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
            serde_json::Value::String(_) => serde_json::Value::String(value.into()),
            _ => return Err(unknown()),
        };
        obj.insert(leaf.to_string(), new_value);
        Ok(())
    }

    /// Default location of the settings file.
    pub fn path() -> Result<PathBuf, CoreError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if the file is
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// defaults cannot be written.
    pub fn load() -> Result<Self, CoreError> {
        Ok(Self::load_from(&Self::path()?)?)
    }

    /// Same as [`load`](Self::load) for an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let settings: Settings =
                    toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    })?;
                settings.validate()?;
                Ok(settings)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let settings = Self::default();
                settings.save_to(path)?;
                Ok(settings)
            }
            Err(err) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: err.to_string(),
            }),
        }
    }

    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "falling back to default settings");
            Self::default()
        })
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be serialized or written.
    pub fn save(&self) -> Result<(), CoreError> {
        Ok(self.save_to(&Self::path()?)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a setting as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Every leaf setting as `(dot.path, value)`, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    /// Set a setting by key, keeping the value's type. Does not save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// or is out of range. The settings are left unchanged on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Settings =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.driver.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "driver.tick_interval_ms".into(),
                message: "must be positive".into(),
            });
        }
        if self.driver.lookup_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "driver.lookup_timeout_ms".into(),
                message: "must be positive".into(),
            });
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> StdDuration {
        StdDuration::from_millis(self.driver.tick_interval_ms)
    }

    pub fn lookup_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.driver.lookup_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_roundtrip() {
        let settings = Settings::default();
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        assert!(toml_str.contains("tick_interval_ms = 1000"));
        assert!(toml_str.contains("time_zone = \"local\""));
        let parsed: Settings = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let parsed: Settings = toml::from_str("[clock]\ntime_zone = \"utc\"\n").unwrap();
        assert_eq!(parsed.clock.time_zone, TimeZoneSetting::Utc);
        assert_eq!(parsed.tick_interval(), StdDuration::from_secs(1));
        assert_eq!(parsed.lookup_timeout(), StdDuration::from_millis(800));
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let settings = Settings::default();
        assert_eq!(settings.get("driver.tick_interval_ms").as_deref(), Some("1000"));
        assert_eq!(settings.get("clock.time_zone").as_deref(), Some("local"));
        assert!(settings.get("driver.missing").is_none());
        assert!(settings.get("").is_none());
    }

    #[test]
    fn set_keeps_types() {
        let mut settings = Settings::default();
        settings.set("driver.lookup_timeout_ms", "250").unwrap();
        assert_eq!(settings.driver.lookup_timeout_ms, 250);
        settings.set("clock.time_zone", "utc").unwrap();
        assert_eq!(settings.clock.time_zone, TimeZoneSetting::Utc);
    }

    #[test]
    fn set_rejects_bad_input_without_changes() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.set("driver.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            settings.set("driver", "{\"tick_interval_ms\": 5}"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            settings.set("driver.tick_interval_ms", "soon"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            settings.set("driver.tick_interval_ms", "0"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            settings.set("clock.time_zone", "mars"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn entries_lists_every_leaf() {
        let keys: Vec<String> = Settings::default().entries().into_iter().map(|(k, _)| k).collect();
        assert!(keys.contains(&"driver.tick_interval_ms".to_string()));
        assert!(keys.contains(&"driver.lookup_timeout_ms".to_string()));
        assert!(keys.contains(&"clock.time_zone".to_string()));
    }

    #[test]
    fn load_writes_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert_eq!(Settings::load_from(&path).unwrap(), Settings::default());
        assert!(path.exists());

        let mut settings = Settings::default();
        settings.set("driver.tick_interval_ms", "500").unwrap();
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap().driver.tick_interval_ms, 500);

        std::fs::write(&path, "driver = 3").unwrap();
        assert!(matches!(
            Settings::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
