//! Preference-driven locale redirect.

mod common;

use clientsync::cache::{KvStore, MemoryStore, TtlVersionedCache};
use clientsync::clock::ManualClock;
use clientsync::error::SyncError;
use clientsync::preference::{
    LocaleRouting, LocationContext, PreferenceReconciler, PreferenceRecord, PrefixMode,
    ReconcileOutcome,
};
use clientsync::retry::RetryPolicy;
use clientsync::session::SessionStore;
use common::{FakePreferenceApi, RecordingNavigator};
use std::sync::Arc;
use std::time::Duration;

fn routing() -> LocaleRouting {
    LocaleRouting::new(["en", "fr", "de"], "en", PrefixMode::Always)
}

fn reconciler(
    session: SessionStore,
    api: Arc<FakePreferenceApi>,
    navigator: Arc<RecordingNavigator>,
) -> PreferenceReconciler {
    let reconciler = PreferenceReconciler::new(
        session,
        api,
        RetryPolicy::new(2, Duration::from_millis(200), true),
        navigator.clone(),
        routing(),
    );
    navigator.observe(reconciler.redirect_handle());
    reconciler
}

fn en_dashboard() -> LocationContext {
    LocationContext::new("en", "/en/dashboard")
}

#[tokio::test]
async fn redirects_once_to_preferred_locale() {
    let navigator = RecordingNavigator::new();
    let r = reconciler(
        SessionStore::authenticated("u1", "tok"),
        FakePreferenceApi::language("fr"),
        navigator.clone(),
    );

    let outcome = r.reconcile(&en_dashboard()).await;

    assert_eq!(
        outcome,
        ReconcileOutcome::Redirected {
            to: "/fr/dashboard".to_string()
        }
    );
    assert_eq!(navigator.paths(), vec!["/fr/dashboard"]);
    // The flag was already set when navigate ran.
    assert_eq!(navigator.flag_at_call(), vec![true]);
    assert!(r.has_redirected());
    assert!(!r.redirect_state().checking);
}

#[tokio::test(start_paused = true)]
async fn concurrent_passes_navigate_at_most_once() {
    let navigator = RecordingNavigator::new();
    let api = FakePreferenceApi::delayed("fr", Duration::from_millis(500));
    let r = reconciler(SessionStore::authenticated("u1", "tok"), api.clone(), navigator.clone());

    let ctx = en_dashboard();
    let (a, b) = tokio::join!(r.reconcile(&ctx), r.reconcile(&ctx));

    let redirected = [&a, &b]
        .iter()
        .filter(|o| matches!(o, ReconcileOutcome::Redirected { .. }))
        .count();
    assert_eq!(redirected, 1);
    assert_eq!(navigator.paths().len(), 1);
    assert_eq!(api.calls(), 1);
}

#[tokio::test]
async fn later_passes_in_same_mount_do_nothing() {
    let navigator = RecordingNavigator::new();
    let api = FakePreferenceApi::language("fr");
    let r = reconciler(SessionStore::authenticated("u1", "tok"), api.clone(), navigator.clone());

    r.reconcile(&en_dashboard()).await;
    let second = r.reconcile(&LocationContext::new("en", "/en/settings")).await;

    assert_eq!(second, ReconcileOutcome::AlreadyChecked);
    assert_eq!(navigator.paths().len(), 1);
    assert_eq!(api.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn fetch_failure_is_swallowed_after_retries() {
    let navigator = RecordingNavigator::new();
    let api = FakePreferenceApi::with(Err(SyncError::from_status(502, "bad gateway")));
    let r = reconciler(SessionStore::authenticated("u1", "tok"), api.clone(), navigator.clone());

    let outcome = r.reconcile(&en_dashboard()).await;

    assert_eq!(outcome, ReconcileOutcome::FetchFailed);
    assert_eq!(api.calls(), 3);
    assert!(navigator.paths().is_empty());
    assert!(!r.has_redirected());
    assert!(!r.redirect_state().checking);
}

#[tokio::test]
async fn matching_preference_does_not_redirect() {
    let navigator = RecordingNavigator::new();
    let r = reconciler(
        SessionStore::authenticated("u1", "tok"),
        FakePreferenceApi::language("en-US"),
        navigator.clone(),
    );

    assert_eq!(r.reconcile(&en_dashboard()).await, ReconcileOutcome::InSync);
    assert!(navigator.paths().is_empty());
}

#[tokio::test]
async fn missing_preference_is_not_an_error() {
    let navigator = RecordingNavigator::new();
    let api = FakePreferenceApi::with(Ok(PreferenceRecord::default()));
    let r = reconciler(SessionStore::authenticated("u1", "tok"), api, navigator.clone());

    assert_eq!(r.reconcile(&en_dashboard()).await, ReconcileOutcome::NoPreference);
    assert!(navigator.paths().is_empty());
}

#[tokio::test]
async fn unsupported_preference_is_ignored() {
    let navigator = RecordingNavigator::new();
    let r = reconciler(
        SessionStore::authenticated("u1", "tok"),
        FakePreferenceApi::language("ja"),
        navigator.clone(),
    );

    assert_eq!(r.reconcile(&en_dashboard()).await, ReconcileOutcome::Unsupported);
    assert!(navigator.paths().is_empty());
}

#[tokio::test]
async fn same_target_path_skips_navigation() {
    let navigator = RecordingNavigator::new();
    let r = PreferenceReconciler::new(
        SessionStore::authenticated("u1", "tok"),
        FakePreferenceApi::language("fr"),
        RetryPolicy::none(),
        navigator.clone(),
        routing(),
    );

    // Context claims "en" but the path is already under /fr.
    let outcome = r.reconcile(&LocationContext::new("en", "/fr/dashboard")).await;
    assert_eq!(outcome, ReconcileOutcome::SamePath);
    assert!(navigator.paths().is_empty());
    assert!(!r.has_redirected());
}

#[tokio::test]
async fn anonymous_user_is_checked_after_sign_in() {
    let navigator = RecordingNavigator::new();
    let session = SessionStore::new();
    let api = FakePreferenceApi::language("de");
    let r = reconciler(session.clone(), api.clone(), navigator.clone());

    assert_eq!(r.reconcile(&en_dashboard()).await, ReconcileOutcome::NotAuthenticated);
    assert_eq!(api.calls(), 0);

    session.sign_in("u1", "tok");
    let outcome = r.reconcile(&en_dashboard()).await;
    assert_eq!(
        outcome,
        ReconcileOutcome::Redirected {
            to: "/de/dashboard".to_string()
        }
    );
}

#[tokio::test]
async fn cached_preference_skips_fetch() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let clock = ManualClock::at_ms(0);
    let cache = || {
        TtlVersionedCache::<PreferenceRecord>::new(
            store.clone(),
            "preferences",
            "1.0.0",
            Duration::from_secs(3600),
            Arc::new(clock.clone()),
        )
    };

    let api = FakePreferenceApi::language("fr");
    let first = reconciler(
        SessionStore::authenticated("u1", "tok"),
        api.clone(),
        RecordingNavigator::new(),
    )
    .with_cache(cache());
    first.reconcile(&en_dashboard()).await;
    assert_eq!(api.calls(), 1);

    // A fresh mount with the backend down still honours the cached value.
    api.set_response(Err(SyncError::network("offline")));
    let navigator = RecordingNavigator::new();
    let second = reconciler(SessionStore::authenticated("u1", "tok"), api.clone(), navigator.clone())
        .with_cache(cache());
    let outcome = second.reconcile(&en_dashboard()).await;

    assert!(matches!(outcome, ReconcileOutcome::Redirected { .. }));
    assert_eq!(api.calls(), 1);
    assert_eq!(navigator.paths(), vec!["/fr/dashboard"]);
}

#[tokio::test]
async fn cache_is_scoped_to_user() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let clock = ManualClock::at_ms(0);
    let cache = || {
        TtlVersionedCache::<PreferenceRecord>::new(
            store.clone(),
            "preferences",
            "1.0.0",
            Duration::from_secs(3600),
            Arc::new(clock.clone()),
        )
    };

    let api = FakePreferenceApi::language("fr");
    reconciler(SessionStore::authenticated("u1", "tok"), api.clone(), RecordingNavigator::new())
        .with_cache(cache())
        .reconcile(&en_dashboard())
        .await;

    api.set_response(Ok(PreferenceRecord {
        language: Some("de".into()),
        ..PreferenceRecord::default()
    }));
    let navigator = RecordingNavigator::new();
    reconciler(SessionStore::authenticated("u2", "tok"), api.clone(), navigator.clone())
        .with_cache(cache())
        .reconcile(&en_dashboard())
        .await;

    assert_eq!(api.calls(), 2);
    assert_eq!(navigator.paths(), vec!["/de/dashboard"]);
}
