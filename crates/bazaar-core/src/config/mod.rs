//! Client configuration.
//!
//! Provides a unified `ClientConfig` used by the CLI (and any other shell) to
//! discover the marketplace API and the timer/polling cadences.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_COUNTDOWN_TICK_MS: u64 = 1_000;
pub const DEFAULT_NOTIFICATION_POLL_MS: u64 = 30_000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

const MIN_POLL_MS: u64 = 1_000;

/// Runtime configuration for a storefront client.
///
/// Only public endpoints and cadences live here. Credentials are held by the
/// session gate and its credential store, never in this file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default = "default_countdown_tick_ms")]
    pub countdown_tick_ms: u64,
    #[serde(default = "default_notification_poll_ms")]
    pub notification_poll_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            countdown_tick_ms: DEFAULT_COUNTDOWN_TICK_MS,
            notification_poll_ms: DEFAULT_NOTIFICATION_POLL_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

const fn default_countdown_tick_ms() -> u64 {
    DEFAULT_COUNTDOWN_TICK_MS
}

const fn default_notification_poll_ms() -> u64 {
    DEFAULT_NOTIFICATION_POLL_MS
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl ClientConfig {
    /// Load configuration from a JSON file, returning defaults when the file
    /// does not exist.
    pub fn load_from_path(path: &Path) -> SyncResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            SyncError::InvalidConfiguration(format!(
                "failed to read config at {}: {error}",
                path.display()
            ))
        })?;
        Self::parse(&raw)
    }

    /// Parse a JSON payload. Public for testability.
    pub fn parse(payload: &str) -> SyncResult<Self> {
        let config: Self = serde_json::from_str(payload).map_err(|error| {
            SyncError::InvalidConfiguration(format!("invalid config JSON: {error}"))
        })?;
        config.validated()
    }

    /// Apply `BAZAAR_*` overrides from an environment-like lookup.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = normalize_text_option(lookup("BAZAAR_API_URL")) {
            self.api_base_url = Some(url);
        }
        if let Some(raw) = normalize_text_option(lookup("BAZAAR_POLL_INTERVAL_MS")) {
            self.notification_poll_ms = raw.parse().map_err(|_| {
                SyncError::InvalidConfiguration(format!(
                    "BAZAAR_POLL_INTERVAL_MS must be an integer, got '{raw}'"
                ))
            })?;
        }
        self.validated()
    }

    /// Normalize URLs and reject cadences that would hammer the API.
    pub fn validated(mut self) -> SyncResult<Self> {
        self.api_base_url = match normalize_text_option(self.api_base_url.take()) {
            Some(url) => Some(normalize_base_url(&url)?),
            None => None,
        };
        if self.countdown_tick_ms == 0 {
            return Err(SyncError::InvalidConfiguration(
                "countdown_tick_ms must be greater than zero".to_string(),
            ));
        }
        if self.notification_poll_ms < MIN_POLL_MS {
            return Err(SyncError::InvalidConfiguration(format!(
                "notification_poll_ms must be at least {MIN_POLL_MS}"
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfiguration(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }

    /// Returns the configured API base URL or a configuration error.
    pub fn require_api_base_url(&self) -> SyncResult<&str> {
        self.api_base_url.as_deref().ok_or_else(|| {
            SyncError::InvalidConfiguration(
                "api_base_url is not configured (set BAZAAR_API_URL or --api-url)".to_string(),
            )
        })
    }

    pub const fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }

    pub const fn notification_poll_interval(&self) -> Duration {
        Duration::from_millis(self.notification_poll_ms)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Trim, require an http(s) scheme, and drop trailing slashes.
pub fn normalize_base_url(raw: &str) -> SyncResult<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(SyncError::InvalidConfiguration(
            "API base URL must not be empty".to_string(),
        ));
    }
    if !is_http_url(trimmed) {
        return Err(SyncError::InvalidConfiguration(
            "API base URL must include http:// or https://".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_fills_defaults() {
        let config = ClientConfig::parse(r#"{ "api_base_url": "https://shop.example.com/api/" }"#)
            .expect("config should parse");
        assert_eq!(
            config,
            ClientConfig {
                api_base_url: Some("https://shop.example.com/api".to_string()),
                ..ClientConfig::default()
            }
        );
    }

    #[test]
    fn parse_rejects_unknown_fields() {
        let error = ClientConfig::parse(r#"{ "api_base_url": "https://a.b", "theme": "dark" }"#)
            .unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn parse_rejects_aggressive_polling() {
        let error = ClientConfig::parse(r#"{ "notification_poll_ms": 10 }"#).unwrap_err();
        assert!(error.to_string().contains("notification_poll_ms"));
    }

    #[test]
    fn env_overrides_take_precedence() {
        let env = HashMap::from([
            ("BAZAAR_API_URL", "http://localhost:3000/"),
            ("BAZAAR_POLL_INTERVAL_MS", "5000"),
        ]);
        let config = ClientConfig::default()
            .with_env_overrides(|key| env.get(key).map(|value| (*value).to_string()))
            .expect("overrides should apply");
        assert_eq!(
            config.api_base_url.as_deref(),
            Some("http://localhost:3000")
        );
        assert_eq!(config.notification_poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn env_override_rejects_non_numeric_interval() {
        let error = ClientConfig::default()
            .with_env_overrides(|key| {
                (key == "BAZAAR_POLL_INTERVAL_MS").then(|| "soon".to_string())
            })
            .unwrap_err();
        assert!(error.to_string().contains("BAZAAR_POLL_INTERVAL_MS"));
    }

    #[test]
    fn normalize_base_url_requires_scheme() {
        assert!(normalize_base_url("shop.example.com").is_err());
        assert!(normalize_base_url("   ").is_err());
        assert_eq!(
            normalize_base_url(" https://shop.example.com// ").unwrap(),
            "https://shop.example.com"
        );
    }

    #[test]
    fn missing_api_url_is_reported() {
        let error = ClientConfig::default().require_api_base_url().unwrap_err();
        assert!(error.to_string().contains("BAZAAR_API_URL"));
    }
}
