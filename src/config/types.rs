use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::preference::PrefixMode;
use crate::retry::RetryPolicy;

/// Root configuration container. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub locale: LocaleConfig,
}

/// Backend HTTP API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL, endpoint paths are appended (default: http://127.0.0.1:8000/api/v1).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds (default: 10).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Connection timeout in seconds (default: 5).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First retry delay in milliseconds (default: 1000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Double the delay on every retry (default: true).
    #[serde(default = "default_true")]
    pub exponential: bool,
    /// Optional ceiling on a single delay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Poll interval in seconds; 0 fetches once on start (default: 30).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Subscribe to the server event stream (default: false).
    #[serde(default)]
    pub push_enabled: bool,
    /// Poll interval multiplier while the push stream is live (default: 4).
    #[serde(default = "default_push_poll_factor")]
    pub push_poll_factor: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Retention cap on loaded notifications (default: 200).
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Bump to invalidate every entry written by an older build.
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Store file; defaults to the platform cache directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocaleConfig {
    #[serde(default = "default_locales")]
    pub locales: Vec<String>,
    #[serde(default = "default_locale")]
    pub default_locale: String,
    #[serde(default)]
    pub prefix: PrefixMode,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_seconds: default_request_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            exponential: true,
            max_delay_ms: None,
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval(),
            push_enabled: false,
            push_poll_factor: default_push_poll_factor(),
            page_size: default_page_size(),
            max_items: default_max_items(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            schema_version: default_schema_version(),
            path: None,
        }
    }
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            locales: default_locales(),
            default_locale: default_locale(),
            prefix: PrefixMode::Always,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl RetryConfig {
    /// Policy that retries transient failures only.
    pub fn policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            self.exponential,
        )
        .transient_only();
        match self.max_delay_ms {
            Some(ms) => policy.with_max_delay(Duration::from_millis(ms)),
            None => policy,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000/api/v1".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    30
}

fn default_push_poll_factor() -> u32 {
    4
}

fn default_page_size() -> u32 {
    50
}

fn default_max_items() -> usize {
    crate::notifications::DEFAULT_MAX_ITEMS
}

fn default_ttl() -> u64 {
    24 * 60 * 60
}

fn default_schema_version() -> String {
    "1.0.0".to_string()
}

fn default_locales() -> Vec<String> {
    vec!["en".to_string()]
}

fn default_locale() -> String {
    "en".to_string()
}
