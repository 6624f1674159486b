//! Sync engine configuration.
//!
//! `SyncConfig` is read from an optional JSON file and then overridden by
//! `CATCHLOG_*` environment variables.

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_REMOTE_URL: &str = "http://127.0.0.1:8787";
pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 8_000;
pub const DEFAULT_ORPHAN_SAFETY_CAP: usize = 25;

pub const ENV_REMOTE_URL: &str = "CATCHLOG_REMOTE_URL";
pub const ENV_API_KEY: &str = "CATCHLOG_API_KEY";
pub const ENV_REMOTE_TIMEOUT_MS: &str = "CATCHLOG_REMOTE_TIMEOUT_MS";
pub const ENV_ORPHAN_SAFETY_CAP: &str = "CATCHLOG_ORPHAN_SAFETY_CAP";

/// Settings for the remote store and the sync engine.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Base URL of the remote document store
    #[serde(default = "default_remote_url")]
    pub remote_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Deadline applied to every remote call
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,
    /// Orphan audits refuse to delete this many records or more
    #[serde(default = "default_orphan_safety_cap")]
    pub orphan_safety_cap: usize,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncConfig")
            .field("remote_url", &self.remote_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("remote_timeout_ms", &self.remote_timeout_ms)
            .field("orphan_safety_cap", &self.orphan_safety_cap)
            .finish()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_url: default_remote_url(),
            api_key: None,
            remote_timeout_ms: DEFAULT_REMOTE_TIMEOUT_MS,
            orphan_safety_cap: DEFAULT_ORPHAN_SAFETY_CAP,
        }
    }
}

impl SyncConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Read a JSON config file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => load_from_path(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Override fields from `lookup`; blank values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let read = |key: &str| normalize_text_option(lookup(key));

        if let Some(remote_url) = read(ENV_REMOTE_URL) {
            self.remote_url = remote_url;
        }
        if let Some(api_key) = read(ENV_API_KEY) {
            self.api_key = Some(api_key);
        }
        if let Some(raw) = read(ENV_REMOTE_TIMEOUT_MS) {
            self.remote_timeout_ms = raw.parse().map_err(|_| {
                Error::InvalidInput(format!("{ENV_REMOTE_TIMEOUT_MS} must be an integer"))
            })?;
        }
        if let Some(raw) = read(ENV_ORPHAN_SAFETY_CAP) {
            self.orphan_safety_cap = raw.parse().map_err(|_| {
                Error::InvalidInput(format!("{ENV_ORPHAN_SAFETY_CAP} must be an integer"))
            })?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if !is_http_url(self.remote_url.trim()) {
            return Err(Error::InvalidInput(
                "remote_url must include http:// or https://".to_string(),
            ));
        }
        if self.remote_timeout_ms == 0 {
            return Err(Error::InvalidInput(
                "remote_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.orphan_safety_cap == 0 {
            return Err(Error::InvalidInput(
                "orphan_safety_cap must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub const fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }
}

/// Parse and validate a JSON config payload.
pub fn parse_config(payload: &str) -> Result<SyncConfig> {
    let config: SyncConfig = serde_json::from_str(payload)
        .map_err(|error| Error::InvalidInput(format!("invalid sync config JSON: {error}")))?;
    config.validate()?;
    Ok(config)
}

pub fn load_from_path(path: &Path) -> Result<SyncConfig> {
    let payload = std::fs::read_to_string(path)?;
    parse_config(&payload)
}

fn default_remote_url() -> String {
    DEFAULT_REMOTE_URL.to_string()
}

const fn default_remote_timeout_ms() -> u64 {
    DEFAULT_REMOTE_TIMEOUT_MS
}

const fn default_orphan_safety_cap() -> usize {
    DEFAULT_ORPHAN_SAFETY_CAP
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use pretty_assertions::assert_eq;

    fn apply_from_map(map: &HashMap<&str, &str>) -> Result<SyncConfig> {
        let mut config = SyncConfig::default();
        config.apply_env(|key| map.get(key).map(|value| (*value).to_string()))?;
        Ok(config)
    }

    #[test]
    fn empty_payload_uses_defaults() {
        let config = parse_config("{}").unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.remote_timeout(), Duration::from_secs(8));
    }

    #[test]
    fn parse_config_rejects_unknown_fields() {
        let error = parse_config(r#"{"remote_url":"https://x.test","extra":1}"#).unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[test]
    fn parse_config_rejects_zero_cap() {
        assert!(parse_config(r#"{"orphan_safety_cap":0}"#).is_err());
    }

    #[test]
    fn environment_overrides_defaults() {
        let mut map = HashMap::new();
        map.insert(ENV_REMOTE_URL, " https://sync.example.com ");
        map.insert(ENV_API_KEY, "key-123");
        map.insert(ENV_REMOTE_TIMEOUT_MS, "2500");
        map.insert(ENV_ORPHAN_SAFETY_CAP, "5");

        let config = apply_from_map(&map).unwrap();
        assert_eq!(config.remote_url, "https://sync.example.com");
        assert_eq!(config.api_key.as_deref(), Some("key-123"));
        assert_eq!(config.remote_timeout_ms, 2500);
        assert_eq!(config.orphan_safety_cap, 5);
    }

    #[test]
    fn blank_environment_values_are_ignored() {
        let mut map = HashMap::new();
        map.insert(ENV_API_KEY, "   ");
        let config = apply_from_map(&map).unwrap();
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn non_numeric_timeout_is_rejected() {
        let mut map = HashMap::new();
        map.insert(ENV_REMOTE_TIMEOUT_MS, "soon");
        let error = apply_from_map(&map).unwrap_err();
        match error {
            Error::InvalidInput(message) => assert!(message.contains(ENV_REMOTE_TIMEOUT_MS)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn load_from_path_reads_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sync.json");
        std::fs::write(&path, r#"{"remote_url":"https://sync.example.com/"}"#).unwrap();

        let config = load_from_path(&path).unwrap();
        assert_eq!(config.remote_url, "https://sync.example.com/");
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = SyncConfig {
            api_key: Some("secret".to_string()),
            ..SyncConfig::default()
        };
        assert!(!format!("{config:?}").contains("secret"));
    }
}
