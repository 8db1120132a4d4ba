//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::persistence::eviction::EvictionPolicy;
use crate::resilience::retry::RetryPolicy;
use crate::{AppError, Result};

/// Keyring service name used for stored credentials.
pub const KEYRING_SERVICE: &str = "recipe-harness";

/// Job bridge settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct BridgeConfig {
    /// Bounded wait applied to `GET next-job` on an empty queue.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_timeout_seconds: default_poll_timeout(),
        }
    }
}

fn default_poll_timeout() -> u64 {
    20
}

/// Concurrency limits used by recipes when mapping over inputs.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ConcurrencyConfig {
    /// Limit for fully automated runs.
    #[serde(default = "default_machine_limit")]
    pub machine_limit: usize,
    /// Limit when a human reviews each step.
    #[serde(default = "default_human_limit")]
    pub human_limit: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            machine_limit: default_machine_limit(),
            human_limit: default_human_limit(),
        }
    }
}

fn default_machine_limit() -> usize {
    10
}

fn default_human_limit() -> usize {
    1
}

/// Retry/backoff settings for wrapped remote calls.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum attempts including the first; 0 means retry forever.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Minimum backoff wait in milliseconds.
    #[serde(default = "default_min_wait_ms")]
    pub min_wait_ms: u64,
    /// Upper bound on a single backoff wait.
    #[serde(default = "default_max_wait_seconds")]
    pub max_wait_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            min_wait_ms: default_min_wait_ms(),
            max_wait_seconds: default_max_wait_seconds(),
        }
    }
}

impl RetryConfig {
    /// Build the runtime retry policy described by this section.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        let max_attempts = if self.max_attempts == 0 {
            None
        } else {
            Some(self.max_attempts)
        };
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(self.min_wait_ms),
            Duration::from_secs(self.max_wait_seconds),
        )
    }
}

fn default_max_attempts() -> u32 {
    8
}

fn default_min_wait_ms() -> u64 {
    1000
}

fn default_max_wait_seconds() -> u64 {
    60
}

/// Cache eviction settings. Both bounds absent means entries live forever.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// Drop entries not used for this many days.
    #[serde(default)]
    pub max_age_days: Option<u32>,
    /// Keep at most this many entries (least recently used go first).
    #[serde(default)]
    pub max_entries: Option<u32>,
    /// How often the eviction task runs.
    #[serde(default = "default_prune_interval")]
    pub prune_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_days: None,
            max_entries: None,
            prune_interval_seconds: default_prune_interval(),
        }
    }
}

impl CacheConfig {
    /// Eviction policy derived from the configured bounds.
    #[must_use]
    pub fn eviction_policy(&self) -> EvictionPolicy {
        EvictionPolicy {
            max_age: self
                .max_age_days
                .map(|days| chrono::Duration::days(i64::from(days))),
            max_entries: self.max_entries,
        }
    }
}

fn default_prune_interval() -> u64 {
    3600
}

/// OpenAI completion endpoint settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct OpenAiConfig {
    /// API base URL without trailing slash.
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    /// Optional organisation header.
    #[serde(default)]
    pub org_id: Option<String>,
    /// Completion model used by machine agents.
    #[serde(default = "default_openai_model")]
    pub model: String,
    /// Per-request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Token bucket capacity for "alpha" models.
    #[serde(default = "default_alpha_capacity")]
    pub alpha_rate_capacity: u32,
    /// Token bucket refill period for "alpha" models.
    #[serde(default = "default_alpha_period")]
    pub alpha_rate_period_seconds: u64,
    /// API key (populated at runtime).
    #[serde(skip)]
    pub api_key: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            org_id: None,
            model: default_openai_model(),
            request_timeout_seconds: default_request_timeout(),
            alpha_rate_capacity: default_alpha_capacity(),
            alpha_rate_period_seconds: default_alpha_period(),
            api_key: String::new(),
        }
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_openai_model() -> String {
    "text-davinci-002".into()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_alpha_capacity() -> u32 {
    1
}

fn default_alpha_period() -> u64 {
    6
}

fn default_http_port() -> u16 {
    8935
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("cache").join("harness.sqlite3")
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// HTTP port for the polling surface.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// `SQLite` file backing the durable call cache.
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    /// Recipe started for new web sessions; the operator picks one when absent.
    #[serde(default)]
    pub recipe: Option<String>,
    /// Job bridge settings.
    #[serde(default)]
    pub bridge: BridgeConfig,
    /// Concurrency limits.
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    /// Retry/backoff policy for remote calls.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Cache eviction bounds.
    #[serde(default)]
    pub cache: CacheConfig,
    /// OpenAI endpoint settings.
    #[serde(default)]
    pub openai: OpenAiConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the OpenAI API key from OS keychain with env-var fallback.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if neither keychain nor env var provide
    /// the key.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.openai.api_key = load_credential("openai_api_key", "OPENAI_API_KEY").await?;
        Ok(())
    }

    /// Bounded wait for the poll endpoint.
    #[must_use]
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.bridge.poll_timeout_seconds)
    }

    fn validate(&self) -> Result<()> {
        if self.bridge.poll_timeout_seconds == 0 {
            return Err(AppError::Config(
                "bridge.poll_timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.concurrency.machine_limit == 0 || self.concurrency.human_limit == 0 {
            return Err(AppError::Config(
                "concurrency limits must be greater than zero".into(),
            ));
        }

        if self.retry.max_wait_seconds.saturating_mul(1000) < self.retry.min_wait_ms {
            return Err(AppError::Config(
                "retry.max_wait_seconds must not be below retry.min_wait_ms".into(),
            ));
        }

        if self.openai.alpha_rate_capacity == 0 || self.openai.alpha_rate_period_seconds == 0 {
            return Err(AppError::Config(
                "openai alpha rate limit must have a positive capacity and period".into(),
            ));
        }

        if self.cache.prune_interval_seconds == 0 {
            return Err(AppError::Config(
                "cache.prune_interval_seconds must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            cache_path: default_cache_path(),
            recipe: None,
            bridge: BridgeConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            openai: OpenAiConfig::default(),
        }
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    env::var(env_key).map_err(|_| {
        AppError::Config(format!(
            "credential {keyring_key} not found in keychain or {env_key} env var"
        ))
    })
}
