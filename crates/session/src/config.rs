//! Session configuration
//!
//! Configuration is an injected struct, not a config file: the consuming
//! application decides where origin and paths come from. `validate()` runs
//! once at session construction.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Scheme + host of the deployment, e.g. `https://example.com`
    pub origin: String,
    /// Path of the OAuth2 token endpoint, e.g. `/oauth/token`
    pub auth_path: String,
    /// Path prefix for authenticated API calls, e.g. `/api`
    pub api_path: String,
    /// Safety margin before expiry that triggers a proactive refresh
    #[serde(default = "default_refresh_skew", with = "duration_secs")]
    pub refresh_skew: Duration,
    /// Timeout applied to every HTTP call so a hung request cannot hold the
    /// busy flag (and every queued caller) indefinitely
    #[serde(default = "default_http_timeout", with = "duration_secs")]
    pub http_timeout: Duration,
    /// Maximum number of entries held by the cached-GET facade
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_refresh_skew() -> Duration {
    Duration::from_secs(3)
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_cache_capacity() -> usize {
    32
}

/// Serde helper: durations as whole seconds in deserialized config.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl SessionConfig {
    /// Build a configuration with default skew, timeout, and cache capacity.
    pub fn new(
        origin: impl Into<String>,
        auth_path: impl Into<String>,
        api_path: impl Into<String>,
    ) -> Self {
        Self {
            origin: origin.into(),
            auth_path: auth_path.into(),
            api_path: api_path.into(),
            refresh_skew: default_refresh_skew(),
            http_timeout: default_http_timeout(),
            cache_capacity: default_cache_capacity(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.origin.starts_with("http://") && !self.origin.starts_with("https://") {
            return Err(Error::Config(format!(
                "origin must start with http:// or https://, got: {}",
                self.origin
            )));
        }

        for (name, path) in [("auth_path", &self.auth_path), ("api_path", &self.api_path)] {
            if !path.starts_with('/') {
                return Err(Error::Config(format!(
                    "{name} must start with '/', got: {path}"
                )));
            }
        }

        if self.http_timeout.is_zero() {
            return Err(Error::Config("http_timeout must be greater than 0".into()));
        }

        Ok(())
    }

    /// Full URL of the token endpoint.
    pub fn token_url(&self) -> String {
        format!("{}{}", self.origin, self.auth_path)
    }

    /// Full URL of an authenticated API path.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}{}", self.origin, self.api_path, path)
    }
}
