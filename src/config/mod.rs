//! Configuration management for crosslist
//!
//! This module handles loading, parsing, and validating application
//! configuration from YAML files and environment variables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Per-platform configurations, keyed by platform name
    #[serde(default)]
    pub platforms: HashMap<String, PlatformConfig>,

    /// Global options shared by every component
    #[serde(default)]
    pub global: GlobalConfig,

    /// Reconciliation scheduling configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // First, expand environment variables in the YAML string
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from environment variables with prefix CROSSLIST_
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(path) = std::env::var("CROSSLIST_DATABASE_PATH") {
            config.database.path = path;
        }
        if let Ok(level) = std::env::var("CROSSLIST_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(currency) = std::env::var("CROSSLIST_DEFAULT_CURRENCY") {
            config.global.default_currency = currency;
        }
        if let Ok(mode) = std::env::var("CROSSLIST_CONFLICT_RESOLUTION") {
            config.global.conflict_resolution = mode
                .parse()
                .map_err(|e: String| ConfigError::Parse(e))?;
        }

        Ok(config)
    }

    /// Names of all enabled platforms, in stable order
    pub fn enabled_platforms(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .platforms
            .iter()
            .filter(|(_, cfg)| cfg.enabled)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

/// Configuration for one marketplace platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformConfig {
    /// Whether this platform participates in any operation
    #[serde(default)]
    pub enabled: bool,

    /// Sustained outbound call budget
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Maximum burst of calls admitted at once
    #[serde(default = "default_burst_limit")]
    pub burst_limit: u32,

    /// Maximum number of retry attempts per call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Exponential backoff base
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Maximum backoff duration in seconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    /// Whether to add jitter to backoff
    #[serde(default)]
    pub jitter: bool,

    /// HTTP statuses treated as retryable
    #[serde(default = "default_retry_on_status")]
    pub retry_on_status: Vec<u16>,

    /// Override for the platform API base URL (tests, staging)
    pub upstream: Option<String>,

    /// Whether to target the platform's sandbox environment
    #[serde(default = "default_sandbox")]
    pub sandbox: bool,

    /// Opaque credential material passed through to the adapter
    #[serde(default)]
    pub credentials: HashMap<String, String>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_minute: default_requests_per_minute(),
            burst_limit: default_burst_limit(),
            max_retries: default_max_retries(),
            backoff_factor: default_backoff_factor(),
            max_backoff_secs: default_max_backoff(),
            jitter: false,
            retry_on_status: default_retry_on_status(),
            upstream: None,
            sandbox: default_sandbox(),
            credentials: HashMap::new(),
        }
    }
}

impl PlatformConfig {
    /// Rate-limit settings for this platform's token bucket
    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_minute: self.requests_per_minute,
            burst_limit: self.burst_limit,
        }
    }

    /// Retry settings for this platform's calls
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            backoff_factor: self.backoff_factor,
            max_backoff_secs: self.max_backoff_secs,
            jitter: self.jitter,
            retry_on_status: self.retry_on_status.clone(),
        }
    }

    /// Fetch a credential value by key
    pub fn credential(&self, key: &str) -> Option<&str> {
        self.credentials.get(key).map(String::as_str)
    }
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_burst_limit() -> u32 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_max_backoff() -> u64 {
    60
}

fn default_retry_on_status() -> Vec<u16> {
    vec![429, 500, 502, 503, 504]
}

fn default_sandbox() -> bool {
    true
}

/// Token bucket configuration for one platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    /// Sustained refill budget
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Bucket capacity
    #[serde(default = "default_burst_limit")]
    pub burst_limit: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            burst_limit: default_burst_limit(),
        }
    }
}

/// Retry configuration for platform calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Exponential backoff base; the wait before retry N is
    /// `backoff_factor^N` seconds
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Maximum backoff duration in seconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    /// Whether to add jitter to backoff
    #[serde(default)]
    pub jitter: bool,

    /// HTTP statuses treated as retryable
    #[serde(default = "default_retry_on_status")]
    pub retry_on_status: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_factor: default_backoff_factor(),
            max_backoff_secs: default_max_backoff(),
            jitter: false,
            retry_on_status: default_retry_on_status(),
        }
    }
}

/// Conflict resolution mode for reconciliation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Record divergences and surface them; never mutate automatically
    #[default]
    Manual,
    /// The most recently observed value wins
    LatestWins,
    /// A configured platform precedence order decides the winner
    Automatic,
}

impl std::str::FromStr for ConflictResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(ConflictResolution::Manual),
            "latest_wins" => Ok(ConflictResolution::LatestWins),
            "automatic" => Ok(ConflictResolution::Automatic),
            other => Err(format!("Unknown conflict resolution mode: {}", other)),
        }
    }
}

/// Global options shared by every component
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    /// Currency assumed when a listing carries none
    #[serde(default = "default_currency")]
    pub default_currency: String,

    /// Upper bound on photos per listing
    #[serde(default = "default_max_photos")]
    pub max_photos_per_listing: usize,

    /// Page size for paginated remote fetches
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Upper bound on concurrently dispatched platform calls
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// How reconciliation resolves divergent platform state
    #[serde(default)]
    pub conflict_resolution: ConflictResolution,

    /// Platform precedence for `automatic` resolution, highest first
    #[serde(default)]
    pub platform_precedence: Vec<String>,

    /// Optional global timeout for one logical operation, in seconds
    pub operation_timeout_secs: Option<u64>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_currency: default_currency(),
            max_photos_per_listing: default_max_photos(),
            batch_size: default_batch_size(),
            max_workers: default_max_workers(),
            conflict_resolution: ConflictResolution::default(),
            platform_precedence: Vec::new(),
            operation_timeout_secs: None,
        }
    }
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_max_photos() -> usize {
    10
}

fn default_batch_size() -> usize {
    50
}

fn default_max_workers() -> usize {
    5
}

/// Reconciliation scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// Interval between reconciliation passes (seconds)
    #[serde(default = "default_sync_interval")]
    pub interval_secs: u64,

    /// Initial delay before the first pass (seconds)
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,

    /// Jitter range added to each tick (seconds)
    #[serde(default = "default_jitter_secs")]
    pub jitter_secs: u64,

    /// Pass timeout (seconds)
    #[serde(default = "default_pass_timeout")]
    pub pass_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sync_interval(),
            initial_delay_secs: default_initial_delay(),
            jitter_secs: default_jitter_secs(),
            pass_timeout_secs: default_pass_timeout(),
        }
    }
}

fn default_sync_interval() -> u64 {
    3600
}

fn default_initial_delay() -> u64 {
    5
}

fn default_jitter_secs() -> u64 {
    60
}

fn default_pass_timeout() -> u64 {
    300
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "crosslist.db".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Expand `${VAR_NAME}` references against the process environment
///
/// Unset variables are left as-is so secrets never silently collapse to
/// empty strings.
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
