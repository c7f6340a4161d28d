//! TOML-based configuration.
//!
//! Stores:
//! - Calendar target, default start time and zone, completion marker
//! - Retry/backoff budget for provider calls
//! - Sync concurrency and week boundary
//! - Storage file names inside the data directory
//!
//! Configuration is stored at `~/.config/routinecal/config.toml`.

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::error::{ConfigError, Result};
use crate::integrations::google::DEFAULT_API_BASE;
use crate::scheduler::ScheduleOptions;
use crate::sync::completion::CompletionStyle;
use crate::sync::event_transform::{parse_start_time, parse_time_zone, EventDefaults};
use crate::sync::retry::RetryPolicy;

const CONFIG_FILE: &str = "config.toml";

/// Calendar target and event appearance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// `HH:MM`, local to `default_time_zone`.
    #[serde(default = "default_start_time")]
    pub default_start_time: String,
    #[serde(default = "default_time_zone")]
    pub default_time_zone: String,
    #[serde(default = "default_completed_color_id")]
    pub completed_color_id: String,
    #[serde(default = "default_completion_marker")]
    pub completion_marker: String,
}

/// Backoff budget for transient provider failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_true")]
    pub jitter: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Routines reconciled in parallel by `sync all`.
    #[serde(default = "default_max_concurrent_routines")]
    pub max_concurrent_routines: usize,
    #[serde(default = "default_week_start")]
    pub week_start: String,
}

/// File names relative to the data directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_routines_file")]
    pub routines_file: String,
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_calendar_id() -> String {
    "primary".into()
}
fn default_api_base() -> String {
    DEFAULT_API_BASE.into()
}
fn default_start_time() -> String {
    "09:00".into()
}
fn default_time_zone() -> String {
    "UTC".into()
}
fn default_completed_color_id() -> String {
    "10".into()
}
fn default_completion_marker() -> String {
    "✅ ".into()
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    8000
}
fn default_true() -> bool {
    true
}
fn default_max_concurrent_routines() -> usize {
    4
}
fn default_week_start() -> String {
    "monday".into()
}
fn default_routines_file() -> String {
    "routines.json".into()
}
fn default_database_file() -> String {
    "routinecal.db".into()
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            calendar_id: default_calendar_id(),
            api_base: default_api_base(),
            default_start_time: default_start_time(),
            default_time_zone: default_time_zone(),
            completed_color_id: default_completed_color_id(),
            completion_marker: default_completion_marker(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: true,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_routines: default_max_concurrent_routines(),
            week_start: default_week_start(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            routines_file: default_routines_file(),
            database_file: default_database_file(),
        }
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

impl Config {
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

    /// Replace a leaf value, keeping the JSON type of the value it replaces.
    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> std::result::Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let (parent_path, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };
        if leaf.is_empty() {
            return Err(unknown());
        }

        let parent = match parent_path {
            Some(path) => parent_path_mut(root, path).ok_or_else(unknown)?,
            None => root,
        };
        let obj = parent.as_object_mut().ok_or_else(unknown)?;
        let existing = obj.get(leaf).ok_or_else(unknown)?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|_| invalid(key, format!("cannot parse '{value}' as bool")))?,
            ),
            serde_json::Value::Number(_) => serde_json::Value::Number(
                value
                    .parse::<u64>()
                    .map_err(|_| invalid(key, format!("cannot parse '{value}' as integer")))?
                    .into(),
            ),
            serde_json::Value::Object(_) | serde_json::Value::Array(_) => return Err(unknown()),
            _ => serde_json::Value::String(value.into()),
        };

        obj.insert(leaf.to_string(), new_value);
        Ok(())
    }

    /// Path of the config file inside `dir`.
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(CONFIG_FILE)
    }

    /// Load from the default data directory.
    pub fn load() -> Result<Self> {
        Self::load_from(&data_dir()?)
    }

    /// Load from `dir`, writing defaults if no config file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed or holds
    /// invalid values, or if the default config cannot be written.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let path = Self::path_in(dir);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(dir)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Persist into `dir`.
    pub fn save_to(&self, dir: &Path) -> Result<()> {
        let path = Self::path_in(dir);
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.clone(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::create_dir_all(dir).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(&path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Every leaf as `(dot.path, value)`, in declaration order.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            flatten("", &json, &mut out);
        }
        out
    }

    /// Set a value by dot-separated key. The change is validated but not saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse
    /// or fails validation; `self` is left unchanged in that case.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json)
            .map_err(|e| invalid(key, e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Check values that serde alone cannot.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        parse_start_time(&self.calendar.default_start_time)
            .map_err(|e| invalid("calendar.default_start_time", e.to_string()))?;
        parse_time_zone(&self.calendar.default_time_zone)
            .map_err(|e| invalid("calendar.default_time_zone", e.to_string()))?;
        if self.calendar.calendar_id.trim().is_empty() {
            return Err(invalid("calendar.calendar_id", "must not be empty"));
        }
        if self.calendar.completion_marker.trim().is_empty() {
            return Err(invalid("calendar.completion_marker", "must not be empty"));
        }
        self.week_start()?;
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(invalid(
                "retry.base_delay_ms",
                "must not exceed retry.max_delay_ms",
            ));
        }
        if self.sync.max_concurrent_routines == 0 {
            return Err(invalid("sync.max_concurrent_routines", "must be at least 1"));
        }
        Ok(())
    }

    fn week_start(&self) -> std::result::Result<Weekday, ConfigError> {
        self.sync
            .week_start
            .trim()
            .parse::<Weekday>()
            .map_err(|_| invalid("sync.week_start", format!("unknown weekday '{}'", self.sync.week_start)))
    }

    /// Defaults the event transformer falls back to.
    pub fn event_defaults(&self) -> std::result::Result<EventDefaults, ConfigError> {
        let start_time = parse_start_time(&self.calendar.default_start_time)
            .map_err(|e| invalid("calendar.default_start_time", e.to_string()))?;
        parse_time_zone(&self.calendar.default_time_zone)
            .map_err(|e| invalid("calendar.default_time_zone", e.to_string()))?;
        Ok(EventDefaults {
            start_time,
            time_zone: self.calendar.default_time_zone.trim().to_string(),
        })
    }

    pub fn completion_style(&self) -> CompletionStyle {
        CompletionStyle {
            marker: self.calendar.completion_marker.clone(),
            color_id: self.calendar.completed_color_id.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.base_delay_ms),
            Duration::from_millis(self.retry.max_delay_ms),
        )
        .with_jitter(self.retry.jitter)
    }

    pub fn schedule_options(&self) -> std::result::Result<ScheduleOptions, ConfigError> {
        Ok(ScheduleOptions {
            week_start: self.week_start()?,
        })
    }

    pub fn database_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.storage.database_file)
    }

    pub fn routines_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.storage.routines_file)
    }
}

fn parent_path_mut<'a>(root: &'a mut serde_json::Value, path: &str) -> Option<&'a mut serde_json::Value> {
    let mut current = root;
    for part in path.split('.') {
        current = current.get_mut(part)?;
    }
    Some(current)
}

fn flatten(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
    match value {
        serde_json::Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten(&key, v, out);
            }
        }
        serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        other => out.push((prefix.to_string(), other.to_string())),
    }
}
