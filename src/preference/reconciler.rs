//! One-shot redirect to the user's stored locale preference.
//!
//! The check runs at most once per mount. Fetch failures are swallowed so
//! the current locale stays in effect, and `has_redirected` is set before
//! `navigate` is called so a racing second pass cannot redirect again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::locale::{localized_path, LocaleRouting};
use crate::cache::TtlVersionedCache;
use crate::error::SyncError;
use crate::lifecycle::Lifecycle;
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::session::SessionStore;

/// Stored user preferences. Only the locale fields are interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PreferenceRecord {
    /// `language`, falling back to `locale`. Blank values count as unset.
    pub fn preferred(&self) -> Option<&str> {
        [self.language.as_deref(), self.locale.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|v| !v.is_empty())
    }
}

#[async_trait]
pub trait PreferenceApi: Send + Sync {
    async fn fetch_preferences(&self) -> Result<PreferenceRecord, SyncError>;
}

/// Navigation side effect. The reconciler never routes by itself.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedirectState {
    /// One-shot per load; never reset once set.
    pub has_redirected: bool,
    pub checking: bool,
}

/// Shared view of a reconciler's [`RedirectState`].
#[derive(Debug, Clone, Default)]
pub struct RedirectHandle(Arc<Mutex<RedirectState>>);

impl RedirectHandle {
    pub fn get(&self) -> RedirectState {
        *self.0.lock()
    }
}

/// Where the application currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationContext {
    pub locale: String,
    pub path: String,
}

impl LocationContext {
    pub fn new(locale: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    NotAuthenticated,
    /// This mount already ran its check, or already redirected.
    AlreadyChecked,
    FetchFailed,
    NoPreference,
    /// The stored preference names a locale the app does not serve.
    Unsupported,
    InSync,
    /// The preference differs but maps to the current path.
    SamePath,
    Redirected { to: String },
}

pub struct PreferenceReconciler {
    session: SessionStore,
    api: Arc<dyn PreferenceApi>,
    policy: RetryPolicy,
    navigator: Arc<dyn Navigator>,
    routing: LocaleRouting,
    cache: Option<TtlVersionedCache<PreferenceRecord>>,
    redirect: RedirectHandle,
    checked: AtomicBool,
    lifecycle: Lifecycle,
}

impl PreferenceReconciler {
    pub fn new(
        session: SessionStore,
        api: Arc<dyn PreferenceApi>,
        policy: RetryPolicy,
        navigator: Arc<dyn Navigator>,
        routing: LocaleRouting,
    ) -> Self {
        Self {
            session,
            api,
            policy,
            navigator,
            routing,
            cache: None,
            redirect: RedirectHandle::default(),
            checked: AtomicBool::new(false),
            lifecycle: Lifecycle::new(),
        }
    }

    /// Serve the preference from `cache` (keyed by user id) when valid.
    pub fn with_cache(mut self, cache: TtlVersionedCache<PreferenceRecord>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn redirect_state(&self) -> RedirectState {
        self.redirect.get()
    }

    pub fn redirect_handle(&self) -> RedirectHandle {
        self.redirect.clone()
    }

    pub fn has_redirected(&self) -> bool {
        self.redirect.get().has_redirected
    }

    /// Cancel pending fetch retries; later passes never navigate.
    pub fn dispose(&self) {
        self.lifecycle.dispose();
    }

    pub async fn reconcile(&self, context: &LocationContext) -> ReconcileOutcome {
        if self.checked.swap(true, Ordering::SeqCst) {
            return ReconcileOutcome::AlreadyChecked;
        }
        if !self.session.is_authenticated() {
            // Not a completed check: a pass after sign-in may still run.
            self.checked.store(false, Ordering::SeqCst);
            return ReconcileOutcome::NotAuthenticated;
        }

        self.redirect.0.lock().checking = true;
        let fetched = self.load_preference().await;
        self.redirect.0.lock().checking = false;

        let record = match fetched {
            Ok(record) => record,
            Err(err) => {
                tracing::debug!(kind = %err.kind(), error = %err, "Preference fetch failed, keeping current locale");
                return ReconcileOutcome::FetchFailed;
            }
        };
        if self.lifecycle.is_disposed() {
            return ReconcileOutcome::FetchFailed;
        }

        let Some(raw) = record.preferred() else {
            return ReconcileOutcome::NoPreference;
        };
        let Some(preferred) = self.routing.normalize(raw) else {
            tracing::debug!(preference = raw, "Preferred locale not supported");
            return ReconcileOutcome::Unsupported;
        };
        if self
            .routing
            .normalize(&context.locale)
            .is_some_and(|current| current == preferred)
        {
            return ReconcileOutcome::InSync;
        }

        let target = localized_path(&context.path, &preferred, &self.routing);
        if target == context.path {
            return ReconcileOutcome::SamePath;
        }

        {
            let mut state = self.redirect.0.lock();
            if state.has_redirected {
                return ReconcileOutcome::AlreadyChecked;
            }
            state.has_redirected = true;
        }
        tracing::info!(from = %context.path, to = %target, "Redirecting to preferred locale");
        self.navigator.navigate(&target);
        ReconcileOutcome::Redirected { to: target }
    }

    async fn load_preference(&self) -> Result<PreferenceRecord, SyncError> {
        let user_id = self.session.user_id();
        let slot = self.cache.as_ref().zip(user_id.as_deref());

        if let Some((cache, user)) = slot {
            if let Some(hit) = cache.load(Some(user)) {
                tracing::debug!(user, "Preference served from cache");
                return Ok(hit);
            }
        }

        let executor = RetryExecutor::new(self.policy.clone()).with_lifecycle(self.lifecycle.clone());
        let api = &self.api;
        let record = executor.execute(|| api.fetch_preferences()).await?;

        if let Some((cache, user)) = slot {
            cache.save(&record, Some(user));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_wins_over_locale() {
        let record: PreferenceRecord =
            serde_json::from_str(r#"{"language":"fr","locale":"de","theme":"dark"}"#).unwrap();
        assert_eq!(record.preferred(), Some("fr"));
        assert_eq!(record.extra["theme"], "dark");
    }

    #[test]
    fn blank_language_falls_back_to_locale() {
        let record: PreferenceRecord =
            serde_json::from_str(r#"{"language":"  ","locale":"de"}"#).unwrap();
        assert_eq!(record.preferred(), Some("de"));
    }

    #[test]
    fn missing_fields_mean_no_preference() {
        let record: PreferenceRecord = serde_json::from_str(r#"{"timezone":"UTC"}"#).unwrap();
        assert_eq!(record.preferred(), None);
    }
}
