//! Versioned, TTL-bound cache slot for one server-owned record.
//!
//! An entry is valid iff its schema version matches the current one, it is
//! younger than the TTL, and (when asked) its disambiguating key matches.
//! Invalid entries are deleted on sight. Storage failures degrade to a miss:
//! the cache is an optimisation, never a source of truth.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::store::KvStore;
use crate::clock::Clock;

/// What is persisted in the store for a cache slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub version: String,
    /// Epoch milliseconds at save time.
    pub timestamp: i64,
    pub value: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Why an entry was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    VersionMismatch,
    Expired,
    KeyMismatch,
    Corrupt,
}

impl Invalidation {
    fn as_str(&self) -> &'static str {
        match self {
            Invalidation::VersionMismatch => "version_mismatch",
            Invalidation::Expired => "expired",
            Invalidation::KeyMismatch => "key_mismatch",
            Invalidation::Corrupt => "corrupt",
        }
    }
}

pub struct TtlVersionedCache<T> {
    store: Arc<dyn KvStore>,
    slot: String,
    schema_version: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    _value: PhantomData<fn() -> T>,
}

impl<T> Clone for TtlVersionedCache<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            slot: self.slot.clone(),
            schema_version: self.schema_version.clone(),
            ttl: self.ttl,
            clock: Arc::clone(&self.clock),
            _value: PhantomData,
        }
    }
}

impl<T> TtlVersionedCache<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(
        store: Arc<dyn KvStore>,
        slot: impl Into<String>,
        schema_version: impl Into<String>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            slot: slot.into(),
            schema_version: schema_version.into(),
            ttl,
            clock,
            _value: PhantomData,
        }
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Persist `value` stamped with the current schema version and time,
    /// replacing whatever the slot held. Returns false if the write failed.
    pub fn save(&self, value: &T, key: Option<&str>) -> bool {
        let entry = CacheEntry {
            version: self.schema_version.clone(),
            timestamp: self.clock.now_ms(),
            value,
            key: key.map(str::to_string),
        };
        let serialized = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(slot = %self.slot, error = %e, "Cache entry not serializable");
                return false;
            }
        };
        match self.store.set(&self.slot, &serialized) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(slot = %self.slot, error = %e, "Cache write failed, continuing without cache");
                false
            }
        }
    }

    /// The cached value if valid for `expected_key`; invalid entries are deleted.
    pub fn load(&self, expected_key: Option<&str>) -> Option<T> {
        let entry = self.valid_entry(expected_key)?;
        match serde_json::from_value(entry.value) {
            Ok(value) => Some(value),
            Err(_) => {
                self.invalidate(Invalidation::Corrupt);
                None
            }
        }
    }

    /// Whether [`load`](Self::load) would hit, with the same side effects.
    pub fn is_valid(&self, expected_key: Option<&str>) -> bool {
        self.load(expected_key).is_some()
    }

    /// Time since the entry was saved; `None` when the slot is empty.
    pub fn age(&self) -> Option<Duration> {
        let entry = self.read_entry()?;
        let elapsed = self.clock.now_ms().saturating_sub(entry.timestamp).max(0);
        Some(Duration::from_millis(elapsed as u64))
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.remove(&self.slot) {
            tracing::warn!(slot = %self.slot, error = %e, "Cache clear failed");
        }
    }

    fn read_entry(&self) -> Option<CacheEntry<serde_json::Value>> {
        let raw = match self.store.get(&self.slot) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(slot = %self.slot, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(_) => {
                self.invalidate(Invalidation::Corrupt);
                None
            }
        }
    }

    fn valid_entry(&self, expected_key: Option<&str>) -> Option<CacheEntry<serde_json::Value>> {
        let entry = self.read_entry()?;
        match self.check(&entry, expected_key) {
            Ok(()) => Some(entry),
            Err(reason) => {
                self.invalidate(reason);
                None
            }
        }
    }

    fn check<V>(&self, entry: &CacheEntry<V>, expected_key: Option<&str>) -> Result<(), Invalidation> {
        if entry.version != self.schema_version {
            return Err(Invalidation::VersionMismatch);
        }
        let age_ms = self.clock.now_ms().saturating_sub(entry.timestamp);
        // Saved in the future counts as fresh.
        if u128::try_from(age_ms).unwrap_or(0) >= self.ttl.as_millis() {
            return Err(Invalidation::Expired);
        }
        if let Some(expected) = expected_key {
            if entry.key.as_deref() != Some(expected) {
                return Err(Invalidation::KeyMismatch);
            }
        }
        Ok(())
    }

    fn invalidate(&self, reason: Invalidation) {
        tracing::debug!(slot = %self.slot, reason = reason.as_str(), "Cache entry invalidated");
        self.clear();
    }
}
