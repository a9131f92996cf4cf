//! TOML configuration: types with serde defaults, loading and validation.

mod loader;
mod types;

pub use loader::ConfigError;
pub use types::{ApiConfig, CacheConfig, Config, LocaleConfig, NotificationsConfig, RetryConfig};
