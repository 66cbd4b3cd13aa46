//! Wait session configuration.

use crate::identity::DEFAULT_IDENTITY_PREFIX;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable overriding `timeout_secs`.
pub const TIMEOUT_ENV: &str = "NODE_WAIT_TIMEOUT_SECS";
/// Environment variable overriding `poll_interval_secs`.
pub const POLL_INTERVAL_ENV: &str = "NODE_WAIT_POLL_INTERVAL_SECS";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be a finite, non-negative number of seconds (got {value})")]
    InvalidDuration { field: &'static str, value: f64 },
    #[error("poll_interval_secs must be greater than zero")]
    ZeroPollInterval,
    #[error("{name} is not a number: {value:?}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Time budget and polling cadence of a wait session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitConfig {
    /// Total time budget for one `wait()` call (default: 5 seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,

    /// Delay between two membership queries (default: 0.3 seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: f64,

    /// Prefix of the session's synthetic participant name
    #[serde(default = "default_identity_prefix")]
    pub identity_prefix: String,
}

fn default_timeout_secs() -> f64 {
    5.0
}

fn default_poll_interval_secs() -> f64 {
    0.3
}

fn default_identity_prefix() -> String {
    DEFAULT_IDENTITY_PREFIX.to_string()
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            identity_prefix: default_identity_prefix(),
        }
    }
}

impl WaitConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs_f64();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_secs = interval.as_secs_f64();
        self
    }

    pub fn with_identity_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.identity_prefix = prefix.into();
        self
    }

    /// Check that both durations are representable and the interval is non-zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timeout()?;
        if self.poll_interval()?.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        to_duration("timeout_secs", self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        to_duration("poll_interval_secs", self.poll_interval_secs)
    }

    /// Apply `NODE_WAIT_*` overrides from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment, in production).
    pub fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(TIMEOUT_ENV) {
            self.timeout_secs = parse_secs(TIMEOUT_ENV, value)?;
        }
        if let Some(value) = lookup(POLL_INTERVAL_ENV) {
            self.poll_interval_secs = parse_secs(POLL_INTERVAL_ENV, value)?;
        }
        Ok(self)
    }
}

fn to_duration(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidDuration { field, value })
}

fn parse_secs(name: &'static str, value: String) -> Result<f64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}
