//! Shared test utilities and fakes for the collaborator traits.

#![allow(dead_code, unused_imports)]

pub mod mock_backend;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use clientsync::error::SyncError;
use clientsync::notifications::{
    ListQuery, Notification, NotificationApi, PushMessage, PushSource, UserNotifier,
};
use clientsync::preference::{Navigator, PreferenceApi, PreferenceRecord, RedirectHandle};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Fixed epoch offset so test timestamps read as small integers.
pub const EPOCH: i64 = 1_700_000_000;

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(EPOCH + secs, 0).unwrap()
}

pub fn notification(id: &str, created_secs: i64, read: bool) -> Notification {
    let mut n = Notification::new(id, ts(created_secs));
    n.title = format!("Notification {id}");
    n.read = read;
    n
}

// -- Notification API ---------------------------------------------------------

/// Scripted in-memory notification backend.
#[derive(Default)]
pub struct FakeNotificationApi {
    items: Mutex<Vec<Notification>>,
    list_failures: Mutex<VecDeque<SyncError>>,
    mutation_error: Mutex<Option<SyncError>>,
    calls: Mutex<Vec<String>>,
}

impl FakeNotificationApi {
    pub fn new(items: Vec<Notification>) -> Arc<Self> {
        Arc::new(Self {
            items: Mutex::new(items),
            ..Self::default()
        })
    }

    pub fn set_items(&self, items: Vec<Notification>) {
        *self.items.lock() = items;
    }

    /// Fail the next `n` list calls with `error`.
    pub fn fail_next_lists(&self, n: usize, error: SyncError) {
        let mut failures = self.list_failures.lock();
        for _ in 0..n {
            failures.push_back(error.clone());
        }
    }

    /// Every mutation fails with `error` until cleared.
    pub fn fail_mutations(&self, error: Option<SyncError>) {
        *self.mutation_error.lock() = error;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn mutation(&self, call: String) -> Result<(), SyncError> {
        self.calls.lock().push(call);
        match self.mutation_error.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl NotificationApi for FakeNotificationApi {
    async fn list(&self, query: &ListQuery) -> Result<Vec<Notification>, SyncError> {
        self.calls
            .lock()
            .push(format!("list:{}:{}", query.skip, query.limit));
        if let Some(err) = self.list_failures.lock().pop_front() {
            return Err(err);
        }
        let mut items = self.items.lock().clone();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items
            .into_iter()
            .skip(query.skip as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn mark_read(&self, id: &str) -> Result<(), SyncError> {
        self.mutation(format!("mark_read:{id}"))
    }

    async fn mark_all_read(&self) -> Result<(), SyncError> {
        self.mutation("mark_all_read".to_string())
    }

    async fn delete(&self, id: &str) -> Result<(), SyncError> {
        self.mutation(format!("delete:{id}"))
    }
}

// -- Push source --------------------------------------------------------------

/// Hands out test-controlled streams, one per subscribe call. With no stream
/// queued, subscribing fails.
#[derive(Default)]
pub struct FakePushSource {
    streams: Mutex<VecDeque<mpsc::Receiver<PushMessage>>>,
    subscriptions: Mutex<usize>,
}

impl FakePushSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a stream and return its sending half.
    pub fn open_stream(&self) -> mpsc::Sender<PushMessage> {
        let (tx, rx) = mpsc::channel(16);
        self.streams.lock().push_back(rx);
        tx
    }

    pub fn subscriptions(&self) -> usize {
        *self.subscriptions.lock()
    }
}

#[async_trait]
impl PushSource for FakePushSource {
    async fn subscribe(&self) -> Result<mpsc::Receiver<PushMessage>, SyncError> {
        *self.subscriptions.lock() += 1;
        self.streams
            .lock()
            .pop_front()
            .ok_or_else(|| SyncError::network("stream unavailable"))
    }
}

// -- User feedback ------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl UserNotifier for RecordingNotifier {
    fn notify_user(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

// -- Preferences --------------------------------------------------------------

pub struct FakePreferenceApi {
    response: Mutex<Result<PreferenceRecord, SyncError>>,
    delay: Duration,
    calls: Mutex<usize>,
}

impl FakePreferenceApi {
    pub fn language(lang: &str) -> Arc<Self> {
        Self::with(Ok(PreferenceRecord {
            language: Some(lang.to_string()),
            ..PreferenceRecord::default()
        }))
    }

    pub fn with(response: Result<PreferenceRecord, SyncError>) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(response),
            delay: Duration::ZERO,
            calls: Mutex::new(0),
        })
    }

    pub fn delayed(lang: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Ok(PreferenceRecord {
                language: Some(lang.to_string()),
                ..PreferenceRecord::default()
            })),
            delay,
            calls: Mutex::new(0),
        })
    }

    pub fn set_response(&self, response: Result<PreferenceRecord, SyncError>) {
        *self.response.lock() = response;
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl PreferenceApi for FakePreferenceApi {
    async fn fetch_preferences(&self) -> Result<PreferenceRecord, SyncError> {
        *self.calls.lock() += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.response.lock().clone()
    }
}

/// Records every navigation and whether the redirect flag was already set
/// when it happened.
#[derive(Default)]
pub struct RecordingNavigator {
    paths: Mutex<Vec<String>>,
    flag_at_call: Mutex<Vec<bool>>,
    handle: Mutex<Option<RedirectHandle>>,
}

impl RecordingNavigator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn observe(&self, handle: RedirectHandle) {
        *self.handle.lock() = Some(handle);
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().clone()
    }

    pub fn flag_at_call(&self) -> Vec<bool> {
        self.flag_at_call.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        let flag = self
            .handle
            .lock()
            .as_ref()
            .map(|h| h.get().has_redirected)
            .unwrap_or(false);
        self.flag_at_call.lock().push(flag);
        self.paths.lock().push(path.to_string());
    }
}
