//! Sync configuration module
//!
//! Collects the tunables of the queue, the conflict resolver, the validator and
//! the coordinator's debounce timer. Values can come from the builder, from
//! `ONBOARDING_SYNC_*` environment variables or from a TOML file.

use crate::offline::queue::QueueConfig;
use crate::offline::retry::BackoffStrategy;
use crate::sync::conflict_resolver::ConflictPolicy;
use crate::sync::validator::ValidationPolicy;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default quiet period before a debounced save fires
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Environment variable names
pub const ENV_REMOTE_URL: &str = "ONBOARDING_SYNC_REMOTE_URL";
pub const ENV_DEBOUNCE_MS: &str = "ONBOARDING_SYNC_DEBOUNCE_MS";
pub const ENV_MAX_RETRIES: &str = "ONBOARDING_SYNC_MAX_RETRIES";
pub const ENV_QUEUE_CAPACITY: &str = "ONBOARDING_SYNC_QUEUE_CAPACITY";

/// Sync configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the remote document store
    pub remote_url: Option<String>,
    /// Quiet period before edits are saved
    pub debounce: Duration,
    /// Offline queue settings
    pub queue: QueueConfig,
    /// Conflict detection windows
    pub conflict: ConflictPolicy,
    /// Snapshot validation thresholds
    pub validation: ValidationPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_url: None,
            debounce: DEFAULT_DEBOUNCE,
            queue: QueueConfig::default(),
            conflict: ConflictPolicy::default(),
            validation: ValidationPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Create a new SyncConfigBuilder
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Build a configuration from `ONBOARDING_SYNC_*` environment variables,
    /// falling back to defaults for anything unset
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = Self::builder();

        if let Ok(url) = std::env::var(ENV_REMOTE_URL) {
            builder = builder.remote_url(url);
        }
        if let Some(ms) = env_number::<u64>(ENV_DEBOUNCE_MS)? {
            builder = builder.debounce(Duration::from_millis(ms));
        }
        if let Some(retries) = env_number::<u32>(ENV_MAX_RETRIES)? {
            builder = builder.default_max_retries(retries);
        }
        if let Some(capacity) = env_number::<usize>(ENV_QUEUE_CAPACITY)? {
            builder = builder.queue_capacity(capacity);
        }

        builder.build()
    }

    /// Parse a TOML configuration document
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        file.into_builder().build()
    }

    /// Read and parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.remote_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidUrl(url.clone()));
            }
        }
        if self.queue.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "queue_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.queue.default_max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_retries",
                reason: "must be at least 1".to_string(),
            });
        }
        if let BackoffStrategy::Exponential { base, max } = self.queue.backoff {
            if base > max {
                return Err(ConfigError::InvalidValue {
                    field: "base_retry_delay",
                    reason: format!("{:?} exceeds the ceiling {:?}", base, max),
                });
            }
        }
        if self.conflict.merge_window < self.conflict.conflict_window {
            return Err(ConfigError::InvalidValue {
                field: "merge_window",
                reason: "must not be shorter than the conflict window".to_string(),
            });
        }
        Ok(())
    }
}

fn env_number<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                field: name,
                reason: format!("not a number: {:?}", raw),
            }),
        Err(_) => Ok(None),
    }
}

/// Builder for SyncConfig
#[derive(Debug, Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    /// Set the remote store URL
    pub fn remote_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    /// Set the debounce quiet period
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.config.debounce = debounce;
        self
    }

    /// Set the queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue.capacity = capacity;
        self
    }

    /// Set the retry budget given to newly queued items
    pub fn default_max_retries(mut self, retries: u32) -> Self {
        self.config.queue.default_max_retries = retries;
        self
    }

    /// Set the retry backoff strategy
    pub fn backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.config.queue.backoff = backoff;
        self
    }

    /// Set the conflict policy
    pub fn conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.config.conflict = policy;
        self
    }

    /// Set the validation policy
    pub fn validation_policy(mut self, policy: ValidationPolicy) -> Self {
        self.config.validation = policy;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<SyncConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// On-disk configuration; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    remote_url: Option<String>,
    debounce_ms: Option<u64>,
    queue_capacity: Option<usize>,
    max_retries: Option<u32>,
    base_retry_delay_ms: Option<u64>,
    max_retry_delay_ms: Option<u64>,
    conflict_window_secs: Option<i64>,
    merge_window_secs: Option<i64>,
    stale_after_days: Option<i64>,
}

impl ConfigFile {
    fn into_builder(self) -> SyncConfigBuilder {
        let defaults = SyncConfig::default();
        let mut builder = SyncConfig::builder();

        if let Some(url) = self.remote_url {
            builder = builder.remote_url(url);
        }
        if let Some(ms) = self.debounce_ms {
            builder = builder.debounce(Duration::from_millis(ms));
        }
        if let Some(capacity) = self.queue_capacity {
            builder = builder.queue_capacity(capacity);
        }
        if let Some(retries) = self.max_retries {
            builder = builder.default_max_retries(retries);
        }
        if self.base_retry_delay_ms.is_some() || self.max_retry_delay_ms.is_some() {
            let (default_base, default_max) = match defaults.queue.backoff {
                BackoffStrategy::Exponential { base, max } => (base, max),
                BackoffStrategy::Fixed { interval } => (interval, interval),
            };
            builder = builder.backoff(BackoffStrategy::Exponential {
                base: self
                    .base_retry_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(default_base),
                max: self
                    .max_retry_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(default_max),
            });
        }

        let mut conflict = defaults.conflict;
        if let Some(secs) = self.conflict_window_secs {
            conflict.conflict_window = chrono::Duration::seconds(secs);
        }
        if let Some(secs) = self.merge_window_secs {
            conflict.merge_window = chrono::Duration::seconds(secs);
        }
        builder = builder.conflict_policy(conflict);

        let mut validation = defaults.validation;
        if let Some(days) = self.stale_after_days {
            validation.stale_after = chrono::Duration::days(days);
        }
        builder.validation_policy(validation)
    }
}

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("could not parse configuration: {0}")]
    Parse(String),
}
