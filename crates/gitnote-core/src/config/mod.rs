//! Sync engine configuration
//!
//! Provides `SyncConfig`, the static knobs of the sync service: which remote
//! repository to use, where the Git host's API lives, and the scheduler's
//! timing constants. Per-user state (token, owner, last sync) lives in the
//! settings store instead.

use std::env;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_REPO_NAME: &str = "ai-note-sync";
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_SYNC_INTERVAL_MINUTES: u64 = 5;

const ENV_API_BASE_URL: &str = "GITNOTE_GITHUB_API_URL";
const ENV_REPO_NAME: &str = "GITNOTE_REPO_NAME";
const ENV_DEBOUNCE_SECS: &str = "GITNOTE_DEBOUNCE_SECS";

/// Configuration for the sync service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Repository created on first sync when the user hasn't picked one
    pub repo_name: String,
    /// Git host REST API base URL, without trailing slash
    pub api_base_url: String,
    /// Auto-sync interval used until the user sets one (minutes)
    pub default_sync_interval_minutes: u64,
    /// Quiet period between a local mutation and the sync it triggers
    pub debounce_delay: Duration,
    /// Delay before re-running a sync requested while one was in flight
    pub rerun_delay: Duration,
    /// Wait after creating the remote repository before writing to it
    pub settle_delay: Duration,
    /// Attempts at writing the welcome file into a fresh repository
    pub settle_attempts: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            repo_name: DEFAULT_REPO_NAME.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            default_sync_interval_minutes: DEFAULT_SYNC_INTERVAL_MINUTES,
            debounce_delay: Duration::from_secs(30),
            rerun_delay: Duration::from_secs(1),
            settle_delay: Duration::from_secs(2),
            settle_attempts: 3,
        }
    }
}

impl SyncConfig {
    /// Load overrides from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load overrides through `lookup`; unset variables keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = normalize_text_option(lookup(ENV_API_BASE_URL)) {
            if !is_http_url(&url) {
                return Err(Error::InvalidInput(format!(
                    "{ENV_API_BASE_URL} must include http:// or https://"
                )));
            }
            config.api_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(name) = normalize_text_option(lookup(ENV_REPO_NAME)) {
            config.repo_name = name;
        }

        if let Some(raw) = normalize_text_option(lookup(ENV_DEBOUNCE_SECS)) {
            let secs = raw.parse::<u64>().map_err(|_| {
                Error::InvalidInput(format!(
                    "{ENV_DEBOUNCE_SECS} must be a whole number of seconds, got '{raw}'"
                ))
            })?;
            config.debounce_delay = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Set the repository name used on first sync
    #[must_use]
    pub fn with_repo_name(mut self, name: impl Into<String>) -> Self {
        self.repo_name = name.into();
        self
    }

    /// Set the API base URL
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the mark-dirty debounce delay
    #[must_use]
    pub const fn with_debounce_delay(mut self, delay: Duration) -> Self {
        self.debounce_delay = delay;
        self
    }

    /// Set the pending re-run delay
    #[must_use]
    pub const fn with_rerun_delay(mut self, delay: Duration) -> Self {
        self.rerun_delay = delay;
        self
    }

    /// Set the repository settle delay and attempt count
    #[must_use]
    pub const fn with_settle(mut self, delay: Duration, attempts: u32) -> Self {
        self.settle_delay = delay;
        self.settle_attempts = attempts;
        self
    }

    /// Set the default auto-sync interval
    #[must_use]
    pub const fn with_default_sync_interval(mut self, minutes: u64) -> Self {
        self.default_sync_interval_minutes = minutes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse_from_map(map: &HashMap<&str, &str>) -> Result<SyncConfig> {
        SyncConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn defaults_match_remote_layout() {
        let config = parse_from_map(&HashMap::new()).unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.repo_name, "ai-note-sync");
        assert_eq!(config.debounce_delay, Duration::from_secs(30));
        assert_eq!(config.default_sync_interval_minutes, 5);
    }

    #[test]
    fn env_overrides_are_normalized() {
        let mut map = HashMap::new();
        map.insert(ENV_API_BASE_URL, " https://git.example.com/api/v3/ ");
        map.insert(ENV_REPO_NAME, "my-notes");
        map.insert(ENV_DEBOUNCE_SECS, "5");

        let config = parse_from_map(&map).unwrap();
        assert_eq!(config.api_base_url, "https://git.example.com/api/v3");
        assert_eq!(config.repo_name, "my-notes");
        assert_eq!(config.debounce_delay, Duration::from_secs(5));
    }

    #[test]
    fn rejects_invalid_values() {
        let mut map = HashMap::new();
        map.insert(ENV_API_BASE_URL, "git.example.com");
        match parse_from_map(&map).unwrap_err() {
            Error::InvalidInput(message) => assert!(message.contains(ENV_API_BASE_URL)),
            other => panic!("unexpected error: {other:?}"),
        }

        let mut map = HashMap::new();
        map.insert(ENV_DEBOUNCE_SECS, "soon");
        match parse_from_map(&map).unwrap_err() {
            Error::InvalidInput(message) => assert!(message.contains(ENV_DEBOUNCE_SECS)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn builders_override_fields() {
        let config = SyncConfig::default()
            .with_repo_name("notes")
            .with_api_base_url("http://localhost:8080/")
            .with_rerun_delay(Duration::from_millis(10))
            .with_settle(Duration::ZERO, 1);
        assert_eq!(config.repo_name, "notes");
        assert_eq!(config.api_base_url, "http://localhost:8080");
        assert_eq!(config.rerun_delay, Duration::from_millis(10));
        assert_eq!(config.settle_attempts, 1);
    }
}
