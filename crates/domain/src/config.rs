//! Client configuration
//!
//! One [`ClientConfig`] describes one logical API client: where it talks to,
//! how fast it may call, and how persistently it retries. Loading from
//! files and the environment lives in the infrastructure crate; this module
//! only defines the shape and its checks.

use std::collections::BTreeMap;
use std::time::Duration;

use apiq_common::{duration_millis, RateLimiterConfig, RetryPolicyConfig};
use serde::{Deserialize, Serialize};

use crate::errors::{ApiqError, Result};

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Settings for one API client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Scheme and host of the API, e.g. `https://api.example.com`
    pub base_url: String,
    /// Version segment inserted between the base URL and every path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Per-request timeout
    #[serde(default = "default_timeout", with = "duration_millis")]
    pub timeout: Duration,
    #[serde(default)]
    pub rate_limit: RateLimiterConfig,
    #[serde(default)]
    pub retry: RetryPolicyConfig,
}

impl ClientConfig {
    /// Configuration with defaults: 1 call per second, 3 retries, 30s timeout
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            version: None,
            headers: BTreeMap::new(),
            user_agent: None,
            timeout: default_timeout(),
            rate_limit: RateLimiterConfig::default(),
            retry: RetryPolicyConfig::default(),
        }
    }

    /// Allow `rps` calls per one-second window
    pub fn with_rps(mut self, rps: u32) -> Self {
        self.rate_limit = RateLimiterConfig { max_calls: rps, time_period: Duration::from_secs(1) };
        self
    }

    /// Allow `retries` attempts after the first, keeping the backoff settings
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retry.max_attempts = retries;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimiterConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicyConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Base URL joined with the version segment, without a trailing slash
    ///
    /// ```rust
    /// use apiq_domain::ClientConfig;
    ///
    /// let config = ClientConfig::new("https://api.example.com/").with_version("v2");
    /// assert_eq!(config.api_root(), "https://api.example.com/v2");
    /// ```
    pub fn api_root(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match self.version.as_deref().map(|v| v.trim_matches('/')) {
            Some(version) if !version.is_empty() => format!("{base}/{version}"),
            _ => base.to_string(),
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`ApiqError::Config`] for an empty or scheme-less base URL, a
    /// zero timeout, or invalid rate limit or retry settings.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ApiqError::Config("base_url must not be empty".into()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ApiqError::Config(format!(
                "base_url must start with http:// or https://, got {}",
                self.base_url
            )));
        }
        if self.timeout.is_zero() {
            return Err(ApiqError::Config("timeout must be greater than zero".into()));
        }
        self.rate_limit.validate()?;
        self.retry.validate()?;
        Ok(())
    }
}
