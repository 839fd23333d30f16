//! Pool configuration types
//!
//! `PoolConfig` is the validated form handed to the pool manager.
//! `PoolSettings` is its string-typed serde form, as read from a TOML file;
//! converting one into the other is where mode parsing and validation happen.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{PoolError, Result};

/// Network address of one backend server
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Endpoint {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl From<String> for Endpoint {
    fn from(address: String) -> Self {
        Self(address)
    }
}

/// How the pool is populated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolMode {
    /// Populate the pool without connecting; connect on first use
    Lazy,
    /// Connect and ping every pooled connection while populating
    Aggressive,
}

impl PoolMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolMode::Lazy => "lazy",
            PoolMode::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for PoolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PoolMode {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lazy" => Ok(PoolMode::Lazy),
            "aggressive" => Ok(PoolMode::Aggressive),
            _ => Err(PoolError::InvalidMode(s.to_string())),
        }
    }
}

/// Retry policy applied to each connection created while populating a pool
///
/// `max_attempts` counts the first try, so the default of 1 means no retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Randomise each delay by up to 25% in either direction
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff_ms,
            max_backoff_ms,
            jitter: false,
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// A policy that tries every connection exactly once
    pub fn none() -> Self {
        Self::default()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 100,
            max_backoff_ms: 5_000,
            jitter: false,
        }
    }
}

/// String-typed pool settings, as found in a configuration file
///
/// ```toml
/// mode = "aggressive"
/// size = 8
/// endpoints = ["10.0.0.1:6379", "10.0.0.2:6379"]
/// connect_timeout_ms = 2000
///
/// [retry]
/// max_attempts = 3
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    pub mode: String,
    pub size: usize,
    pub endpoints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl PoolSettings {
    /// Parse settings from TOML without validating them
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| PoolError::Configuration(e.to_string()))
    }
}

/// Validated, immutable pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PoolSettings", into = "PoolSettings")]
pub struct PoolConfig {
    mode: PoolMode,
    size: usize,
    endpoints: Vec<Endpoint>,
    connect_timeout_ms: Option<u64>,
    retry: RetryPolicy,
}

impl PoolConfig {
    /// Create a configuration, rejecting a zero size or an empty endpoint list
    pub fn new<I, E>(mode: PoolMode, size: usize, endpoints: I) -> Result<Self>
    where
        I: IntoIterator<Item = E>,
        E: Into<Endpoint>,
    {
        let config = Self {
            mode,
            size,
            endpoints: endpoints.into_iter().map(Into::into).collect(),
            connect_timeout_ms: None,
            retry: RetryPolicy::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML configuration
    pub fn from_toml_str(source: &str) -> Result<Self> {
        PoolSettings::from_toml_str(source)?.try_into()
    }

    /// Bound the time spent connecting and probing one connection
    pub fn with_connect_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.connect_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(PoolError::Configuration(
                "Pool size must be greater than 0".to_string(),
            ));
        }
        if self.endpoints.is_empty() {
            return Err(PoolError::Configuration(
                "At least one endpoint is required".to_string(),
            ));
        }
        if let Some(position) = self
            .endpoints
            .iter()
            .position(|e| e.as_str().trim().is_empty())
        {
            return Err(PoolError::Configuration(format!(
                "Endpoint {} is empty",
                position
            )));
        }
        Ok(())
    }

    pub fn mode(&self) -> PoolMode {
        self.mode
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }
}

impl TryFrom<PoolSettings> for PoolConfig {
    type Error = PoolError;

    fn try_from(settings: PoolSettings) -> Result<Self> {
        let mode: PoolMode = settings.mode.parse()?;
        let mut config = Self::new(mode, settings.size, settings.endpoints)?;
        config.connect_timeout_ms = settings.connect_timeout_ms;
        config.retry = RetryPolicy::new(
            settings.retry.max_attempts,
            settings.retry.initial_backoff_ms,
            settings.retry.max_backoff_ms,
        )
        .with_jitter(settings.retry.jitter);
        Ok(config)
    }
}

impl From<PoolConfig> for PoolSettings {
    fn from(config: PoolConfig) -> Self {
        Self {
            mode: config.mode.as_str().to_string(),
            size: config.size,
            endpoints: config.endpoints.into_iter().map(|e| e.0).collect(),
            connect_timeout_ms: config.connect_timeout_ms,
            retry: config.retry,
        }
    }
}
