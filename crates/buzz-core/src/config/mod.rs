//! Sync configuration shared by every client.
//!
//! All fields have production defaults; a JSON file or environment only needs
//! to mention what it overrides.

use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_API_BASE_URL;
use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SUSPENDED_RECHECK_SECS: u64 = 1;
const DEFAULT_LOOKBACK_DAYS: u32 = 30;
const DEFAULT_PER_PAGE: u32 = 50;

/// Ceiling for the poll interval, configured or requested by the server.
pub const MAX_POLL_INTERVAL_SECS: u64 = 3600;
const MAX_REQUEST_TIMEOUT_SECS: u64 = 600;
const MAX_LOOKBACK_DAYS: u32 = 365;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    pub api_base_url: String,
    /// Natural sync cycle
    pub poll_interval_secs: u64,
    /// Budget for every on-demand remote call
    pub request_timeout_secs: u64,
    /// How often a suspended loop re-checks for a session
    pub suspended_recheck_secs: u64,
    pub lookback_days: u32,
    pub per_page: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            suspended_recheck_secs: DEFAULT_SUSPENDED_RECHECK_SECS,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl SyncConfig {
    /// Parse a JSON config document and validate it.
    pub fn from_json(payload: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(payload)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `BUZZ_API_BASE_URL` when set.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(url) = normalize_text_option(std::env::var("BUZZ_API_BASE_URL").ok()) {
            self.api_base_url = url;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !is_http_url(self.api_base_url.trim()) {
            return Err(Error::Config(
                "api_base_url must include http:// or https://".to_string(),
            ));
        }
        for (field, value) in [
            ("poll_interval_secs", self.poll_interval_secs),
            ("request_timeout_secs", self.request_timeout_secs),
            ("suspended_recheck_secs", self.suspended_recheck_secs),
            ("lookback_days", u64::from(self.lookback_days)),
            ("per_page", u64::from(self.per_page)),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{field} must be greater than zero")));
            }
        }
        for (field, value, max) in [
            (
                "poll_interval_secs",
                self.poll_interval_secs,
                MAX_POLL_INTERVAL_SECS,
            ),
            (
                "request_timeout_secs",
                self.request_timeout_secs,
                MAX_REQUEST_TIMEOUT_SECS,
            ),
            (
                "suspended_recheck_secs",
                self.suspended_recheck_secs,
                MAX_POLL_INTERVAL_SECS,
            ),
            (
                "lookback_days",
                u64::from(self.lookback_days),
                u64::from(MAX_LOOKBACK_DAYS),
            ),
            ("per_page", u64::from(self.per_page), 100),
        ] {
            if value > max {
                return Err(Error::Config(format!("{field} must be at most {max}")));
            }
        }
        Ok(())
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub const fn suspended_recheck(&self) -> Duration {
        Duration::from_secs(self.suspended_recheck_secs)
    }

    pub fn lookback(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.lookback_days))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_match_sync_contract() {
        let config = SyncConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.suspended_recheck(), Duration::from_secs(1));
        assert_eq!(config.lookback(), TimeDelta::days(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SyncConfig::from_json(r#"{ "poll_interval_secs": 120 }"#).unwrap();
        assert_eq!(
            config,
            SyncConfig {
                poll_interval_secs: 120,
                ..SyncConfig::default()
            }
        );
    }

    #[test]
    fn rejects_unknown_fields() {
        let error = SyncConfig::from_json(r#"{ "pol_interval": 5 }"#).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn rejects_zero_durations_and_bad_urls() {
        assert!(SyncConfig::from_json(r#"{ "request_timeout_secs": 0 }"#).is_err());
        assert!(SyncConfig::from_json(r#"{ "api_base_url": "api.github.com" }"#).is_err());
        assert!(SyncConfig::from_json(r#"{ "per_page": 500 }"#).is_err());
    }

    #[test]
    fn rejects_intervals_past_their_ceiling() {
        let error = SyncConfig::from_json(r#"{ "poll_interval_secs": 18446744073709551615 }"#)
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Configuration error: poll_interval_secs must be at most 3600"
        );
        assert!(SyncConfig::from_json(r#"{ "poll_interval_secs": 3600 }"#).is_ok());
        assert!(SyncConfig::from_json(r#"{ "request_timeout_secs": 601 }"#).is_err());
        assert!(SyncConfig::from_json(r#"{ "suspended_recheck_secs": 3601 }"#).is_err());
        assert!(SyncConfig::from_json(r#"{ "lookback_days": 4000000000 }"#).is_err());
    }
}
