use serde::Deserialize;

use crate::utils::constants::{
    DEFAULT_LEAD_TIME_SECONDS, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_RETRY_ATTEMPTS,
    DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_DELAY_MS, DEFAULT_STARTUP_TIMEOUT_MS,
    DEFAULT_TICK_INTERVAL_SECONDS,
};

/// ================================
/// Global service-wide settings
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SettingsConfig {
    #[serde(default)]
    pub renewal: RenewalConfig,
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RenewalConfig {
    /// fixed scheduler cadence, independent of token ttl
    #[serde(default = "default_tick_interval_seconds")]
    pub tick_interval_seconds: u64,
    /// renew when the token has less than this left
    #[serde(default = "default_lead_time_seconds")]
    pub lead_time_seconds: u64,
    /// per token endpoint call
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// upper bound for the renewal performed while starting
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,
}

impl Default for RenewalConfig {
    fn default() -> Self {
        Self {
            tick_interval_seconds: DEFAULT_TICK_INTERVAL_SECONDS,
            lead_time_seconds: DEFAULT_LEAD_TIME_SECONDS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            startup_timeout_ms: DEFAULT_STARTUP_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    pub attempts: Option<u32>,
    /// will be mutiply by 2 on every attempt until max_delay_ms
    pub base_delay_ms: Option<u64>,
    /// invariant: >= base_delay_ms
    pub max_delay_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: Some(DEFAULT_RETRY_ATTEMPTS),
            base_delay_ms: Some(DEFAULT_RETRY_BASE_DELAY_MS),
            max_delay_ms: Some(DEFAULT_RETRY_MAX_DELAY_MS),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_path")]
    pub path: String,
    #[serde(default)]
    pub is_enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            path: default_metrics_path(),
            is_enabled: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_server_enabled")]
    pub is_enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            is_enabled: default_server_enabled(),
            host: default_host(),
            port: default_port(),
        }
    }
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

fn default_tick_interval_seconds() -> u64 {
    DEFAULT_TICK_INTERVAL_SECONDS
}

fn default_lead_time_seconds() -> u64 {
    DEFAULT_LEAD_TIME_SECONDS
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_startup_timeout_ms() -> u64 {
    DEFAULT_STARTUP_TIMEOUT_MS
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_server_enabled() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> String {
    "8085".to_string()
}
