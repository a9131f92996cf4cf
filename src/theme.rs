//! Server-owned theme record, memoized in a [`TtlVersionedCache`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::TtlVersionedCache;
use crate::error::SyncError;
use crate::retry::{RetryExecutor, RetryPolicy};

/// Cache slot holding the theme record.
pub const THEME_SLOT: &str = "theme";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeRecord {
    pub key: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub tokens: Map<String, Value>,
}

#[async_trait]
pub trait ThemeApi: Send + Sync {
    async fn fetch_theme(&self, key: &str) -> Result<ThemeRecord, SyncError>;
}

pub struct ThemeLoader {
    api: Arc<dyn ThemeApi>,
    cache: TtlVersionedCache<ThemeRecord>,
    policy: RetryPolicy,
}

impl ThemeLoader {
    pub fn new(api: Arc<dyn ThemeApi>, cache: TtlVersionedCache<ThemeRecord>, policy: RetryPolicy) -> Self {
        Self { api, cache, policy }
    }

    /// Cached record for `key` if still valid, otherwise fetch and cache it.
    pub async fn load(&self, key: &str) -> Result<ThemeRecord, SyncError> {
        if let Some(hit) = self.cache.load(Some(key)) {
            tracing::debug!(key, "Theme served from cache");
            return Ok(hit);
        }

        let executor = RetryExecutor::new(self.policy.clone());
        let api = &self.api;
        let record = executor.execute(|| api.fetch_theme(key)).await?;
        self.cache.save(&record, Some(key));
        Ok(record)
    }

    pub fn invalidate(&self) {
        self.cache.clear();
    }
}
