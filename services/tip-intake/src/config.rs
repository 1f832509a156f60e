// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the tip intake service.
//!
//! Every tunable lives here with a documented default. Values are layered
//! from an optional `tip-intake.{toml,yaml,json}` file and `TIP_*`
//! environment variables (nested keys use `__`, e.g.
//! `TIP_RATE_LIMIT__MAX_PER_WINDOW=20`). The token encryption key is read
//! from `TIP_ENCRYPTION_KEY` and the classifier key from `OPENAI_API_KEY`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors surfaced at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A secret value that never appears in `Debug` output or serialized config.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Configuration for the tip intake service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Submitter token configuration
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Per-submitter rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Content validation, classification and redaction
    #[serde(default)]
    pub moderation: ModerationConfig,

    /// Store access
    #[serde(default)]
    pub store: StoreConfig,

    /// Public tip feed and log-attachment queue
    #[serde(default)]
    pub feed: FeedConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Submitter token configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// AES-256 key: 64 hex characters or 32 raw bytes. Required.
    #[serde(default, skip_serializing)]
    pub encryption_key: Option<Secret>,

    /// Cookie carrying the client-held token (default: tip_token)
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Honour X-Forwarded-For / X-Real-IP when resolving the source address
    /// (default: false)
    #[serde(default)]
    pub trust_forwarded_headers: bool,
}

/// Sliding-window rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum accepted tips per submitter per window (default: 10)
    #[serde(default = "default_max_per_window")]
    pub max_per_window: u32,

    /// Window length in seconds (default: 3600)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Interval of the background sweep in seconds (default: 300)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

/// Moderation pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Maximum content length in characters (default: 1000)
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Maximum number of links before content is treated as spam (default: 3)
    #[serde(default = "default_max_links")]
    pub max_links: usize,

    /// Reject content dominated by one repeated word (default: true)
    #[serde(default = "default_true")]
    pub block_repetition: bool,

    /// External classifier collaborator
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// External classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Moderation endpoint; classification is skipped when unset or when no
    /// API key is configured.
    #[serde(default = "default_classifier_endpoint")]
    pub endpoint: Option<String>,

    /// Bearer key for the endpoint
    #[serde(default, skip_serializing)]
    pub api_key: Option<Secret>,

    /// Optional model name forwarded to the endpoint
    #[serde(default)]
    pub model: Option<String>,

    /// Call timeout in milliseconds (default: 5000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Score at or above which a category counts (default: 0.5)
    #[serde(default = "default_threshold")]
    pub default_threshold: f32,

    /// Per-category threshold overrides, keyed by category label
    #[serde(default)]
    pub thresholds: HashMap<String, f32>,
}

/// Store access configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Timeout for a single store operation in milliseconds (default: 5000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Capacity of the pending log-attachment queue (default: 100)
    #[serde(default = "default_pending_capacity")]
    pub pending_capacity: usize,
}

/// Public feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Tips returned by GET /tips without a limit (default: 20)
    #[serde(default = "default_feed_limit")]
    pub default_limit: usize,

    /// Upper bound for the limit query parameter (default: 100)
    #[serde(default = "default_feed_max_limit")]
    pub max_limit: usize,

    /// Tip IDs handed to one log entry (default: 3)
    #[serde(default = "default_attach_batch")]
    pub attach_batch: usize,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_cookie_name() -> String {
    "tip_token".to_string()
}

fn default_max_per_window() -> u32 {
    10
}

fn default_window_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_max_length() -> usize {
    1000
}

fn default_max_links() -> usize {
    3
}

fn default_classifier_endpoint() -> Option<String> {
    Some("https://api.openai.com/v1/moderations".to_string())
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_threshold() -> f32 {
    0.5
}

fn default_pending_capacity() -> usize {
    100
}

fn default_feed_limit() -> usize {
    20
}

fn default_feed_max_limit() -> usize {
    100
}

fn default_attach_batch() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            identity: IdentityConfig::default(),
            rate_limit: RateLimitConfig::default(),
            moderation: ModerationConfig::default(),
            store: StoreConfig::default(),
            feed: FeedConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            encryption_key: None,
            cookie_name: default_cookie_name(),
            trust_forwarded_headers: false,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_per_window: default_max_per_window(),
            window_secs: default_window_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            max_links: default_max_links(),
            block_repetition: default_true(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: default_classifier_endpoint(),
            api_key: None,
            model: None,
            timeout_ms: default_timeout_ms(),
            default_threshold: default_threshold(),
            thresholds: HashMap::new(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            pending_capacity: default_pending_capacity(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_limit: default_feed_limit(),
            max_limit: default_feed_max_limit(),
            attach_batch: default_attach_batch(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl Config {
    /// Load configuration from `.env`, an optional config file and the
    /// environment, then validate it.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name("tip-intake").required(false))
            .add_source(
                config::Environment::with_prefix("TIP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("identity.encryption_key", std::env::var("TIP_ENCRYPTION_KEY").ok())?
            .set_override_option(
                "moderation.classifier.api_key",
                std::env::var("OPENAI_API_KEY").ok(),
            )?
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the service misbehave at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.max_per_window == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit.max_per_window must be positive".to_string(),
            ));
        }
        if self.rate_limit.window_secs == 0 || self.rate_limit.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit window and sweep interval must be positive".to_string(),
            ));
        }
        if self.moderation.max_length == 0 {
            return Err(ConfigError::Invalid(
                "moderation.max_length must be positive".to_string(),
            ));
        }
        if let Some(endpoint) = &self.moderation.classifier.endpoint {
            let parsed = url::Url::parse(endpoint).map_err(|e| {
                ConfigError::Invalid(format!("moderation.classifier.endpoint: {e}"))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid(format!(
                    "moderation.classifier.endpoint must be http(s), got {}",
                    parsed.scheme()
                )));
            }
        }
        let thresholds = std::iter::once(&self.moderation.classifier.default_threshold)
            .chain(self.moderation.classifier.thresholds.values());
        for threshold in thresholds {
            if !(0.0..=1.0).contains(threshold) {
                return Err(ConfigError::Invalid(format!(
                    "classifier threshold {threshold} outside 0.0..=1.0"
                )));
            }
        }
        if self.feed.default_limit == 0 || self.feed.default_limit > self.feed.max_limit {
            return Err(ConfigError::Invalid(
                "feed.default_limit must be in 1..=feed.max_limit".to_string(),
            ));
        }
        Ok(())
    }
}

impl RateLimitConfig {
    /// Get the rate window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Get the background sweep interval
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl ClassifierConfig {
    /// Get the classifier call timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Threshold for a category label, falling back to the default.
    pub fn threshold_for(&self, category: &str) -> f32 {
        self.thresholds
            .get(category)
            .copied()
            .unwrap_or(self.default_threshold)
    }
}

impl StoreConfig {
    /// Get the store operation timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
