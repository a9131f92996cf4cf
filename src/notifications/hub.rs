//! Notification hub: one consistent list fed by a pull and a push channel,
//! with optimistic local mutations.
//!
//! Every state change goes through [`HubReducer`] in arrival order, so the
//! precedence rules for optimistic edits hold no matter how poll snapshots,
//! push events and user actions interleave.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::api::{NotificationApi, PushSource, UserNotifier};
use super::intent::HubIntent;
use super::model::ListQuery;
use super::reducer::HubReducer;
use super::state::{ChannelMode, HubState, MutationId, DEFAULT_MAX_ITEMS};
use crate::clock::Clock;
use crate::config::NotificationsConfig;
use crate::error::{ErrorKind, SyncError};
use crate::lifecycle::Lifecycle;
use crate::mvi;
use crate::retry::{RetryExecutor, RetryPolicy};

/// Floor for push reconnect backoff so a flapping stream cannot spin.
const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubSettings {
    /// `None` fetches once on start and never polls.
    pub poll_interval: Option<Duration>,
    /// Poll interval multiplier while the push channel is live.
    pub push_poll_factor: u32,
    pub page_size: u32,
    pub max_items: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            poll_interval: Some(Duration::from_secs(30)),
            push_poll_factor: 4,
            page_size: 50,
            max_items: DEFAULT_MAX_ITEMS,
        }
    }
}

impl From<&NotificationsConfig> for HubSettings {
    fn from(config: &NotificationsConfig) -> Self {
        Self {
            poll_interval: (config.poll_interval_seconds > 0)
                .then(|| Duration::from_secs(config.poll_interval_seconds)),
            push_poll_factor: config.push_poll_factor.max(1),
            page_size: config.page_size,
            max_items: config.max_items,
        }
    }
}

#[derive(Clone)]
pub struct NotificationHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    api: Arc<dyn NotificationApi>,
    push: Mutex<Option<Arc<dyn PushSource>>>,
    settings: HubSettings,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn UserNotifier>,
    state: watch::Sender<HubState>,
    lifecycle: Lifecycle,
    next_mutation: AtomicU64,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NotificationHub {
    pub fn new(
        api: Arc<dyn NotificationApi>,
        settings: HubSettings,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn UserNotifier>,
    ) -> Self {
        let (state, _) = watch::channel(HubState::with_max_items(settings.max_items));
        Self {
            inner: Arc::new(HubInner {
                api,
                push: Mutex::new(None),
                settings,
                policy,
                clock,
                notifier,
                state,
                lifecycle: Lifecycle::new(),
                next_mutation: AtomicU64::new(0),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Attach a push source, shared by every clone of the hub. Ignored once
    /// the hub has started.
    pub fn with_push(self, source: Arc<dyn PushSource>) -> Self {
        if self.inner.tasks.lock().is_empty() {
            *self.inner.push.lock() = Some(source);
        } else {
            tracing::warn!("Push source attached after start, ignoring it");
        }
        self
    }

    /// Spawn the pull channel (mount fetch plus periodic polling) and, if
    /// configured, the push channel. Calling it again is a no-op.
    pub fn start(&self) {
        if self.inner.lifecycle.is_disposed() {
            return;
        }
        let mut tasks = self.inner.tasks.lock();
        if !tasks.is_empty() {
            return;
        }

        self.inner.dispatch(HubIntent::ChannelChanged(ChannelMode::Polling));
        tasks.push(tokio::spawn(poll_loop(Arc::clone(&self.inner))));
        let push = self.inner.push.lock().clone();
        if let Some(push) = &push {
            tasks.push(tokio::spawn(push_loop(Arc::clone(&self.inner), Arc::clone(push))));
        }
        tracing::info!(
            poll_interval_secs = self.inner.settings.poll_interval.map(|d| d.as_secs()),
            push = push.is_some(),
            "Notification hub started"
        );
    }

    /// Fetch the first page now, outside the poll schedule. The poll timer
    /// keeps running undisturbed.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        self.inner.fetch_snapshot().await
    }

    /// Fetch the page after the loaded items. Returns how many records
    /// arrived; 0 once the retention cap is reached.
    pub async fn load_more(&self) -> Result<usize, SyncError> {
        let (loaded, max_items) = {
            let state = self.inner.state.borrow();
            (state.items.len(), state.max_items())
        };
        if loaded >= max_items {
            return Ok(0);
        }
        let room = u32::try_from(max_items - loaded).unwrap_or(u32::MAX);
        let skip = u32::try_from(loaded).unwrap_or(u32::MAX);
        let query = ListQuery::page(skip, self.inner.settings.page_size.min(room));

        self.inner.dispatch(HubIntent::LoadStarted);
        let api = &self.inner.api;
        match self.inner.executor().execute(|| api.list(&query)).await {
            Ok(items) => {
                let count = items.len();
                self.inner.dispatch(HubIntent::PageLoaded { items });
                Ok(count)
            }
            Err(err) => Err(self.inner.load_failed(err)),
        }
    }

    pub async fn mark_read(&self, id: &str) -> Result<(), SyncError> {
        let mutation = self.inner.next_mutation();
        self.inner.dispatch(HubIntent::MarkRead {
            mutation,
            ids: vec![id.to_string()],
            at: self.inner.clock.now(),
        });
        let api = &self.inner.api;
        let result = self.inner.executor().execute(|| api.mark_read(id)).await;
        self.inner.settle(mutation, result, "mark notification as read")
    }

    /// Mark every loaded item read with one bulk call. Either the whole
    /// call succeeds or every optimistic mark from it is rolled back.
    pub async fn mark_all_read(&self) -> Result<(), SyncError> {
        let mutation = self.inner.next_mutation();
        let ids = self
            .inner
            .state
            .borrow()
            .items
            .iter()
            .map(|n| n.id.clone())
            .collect();
        self.inner.dispatch(HubIntent::MarkRead {
            mutation,
            ids,
            at: self.inner.clock.now(),
        });
        let api = &self.inner.api;
        let result = self.inner.executor().execute(|| api.mark_all_read()).await;
        self.inner.settle(mutation, result, "mark all notifications as read")
    }

    pub async fn remove(&self, id: &str) -> Result<(), SyncError> {
        let mutation = self.inner.next_mutation();
        self.inner.dispatch(HubIntent::Remove {
            mutation,
            id: id.to_string(),
            at: self.inner.clock.now(),
        });
        let api = &self.inner.api;
        let result = self.inner.executor().execute(|| api.delete(id)).await;
        self.inner.settle(mutation, result, "delete notification")
    }

    pub fn dismiss_error(&self) {
        self.inner.dispatch(HubIntent::DismissError);
    }

    pub fn state(&self) -> HubState {
        self.inner.state.borrow().clone()
    }

    pub fn unread_count(&self) -> usize {
        self.inner.state.borrow().unread_count()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<HubState> {
        self.inner.state.subscribe()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lifecycle.is_disposed()
    }

    /// Stop both channels and cancel pending retries. No state change is
    /// published afterwards.
    pub fn dispose(&self) {
        self.inner.lifecycle.dispose();
        for task in self.inner.tasks.lock().drain(..) {
            task.abort();
        }
        tracing::info!("Notification hub disposed");
    }
}

impl HubInner {
    fn dispatch(&self, intent: HubIntent) {
        if self.lifecycle.is_disposed() {
            return;
        }
        mvi::dispatch::<HubReducer>(&self.state, intent);
    }

    fn executor(&self) -> RetryExecutor {
        RetryExecutor::new(self.policy.clone()).with_lifecycle(self.lifecycle.clone())
    }

    fn next_mutation(&self) -> MutationId {
        MutationId(self.next_mutation.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Mode to fall back to when the push channel is down.
    fn fallback_mode(&self) -> ChannelMode {
        if self.settings.poll_interval.is_some() {
            ChannelMode::Polling
        } else {
            ChannelMode::Idle
        }
    }

    async fn fetch_snapshot(&self) -> Result<(), SyncError> {
        self.dispatch(HubIntent::LoadStarted);
        let page_size = self.settings.page_size;
        let query = ListQuery::page(0, page_size);
        let api = &self.api;
        match self.executor().execute(|| api.list(&query)).await {
            Ok(items) => {
                tracing::debug!(count = items.len(), "Notification snapshot loaded");
                self.dispatch(HubIntent::SnapshotLoaded {
                    items,
                    page_size: page_size as usize,
                });
                Ok(())
            }
            Err(err) => Err(self.load_failed(err)),
        }
    }

    fn load_failed(&self, err: SyncError) -> SyncError {
        if err.kind() != ErrorKind::Cancelled {
            tracing::warn!(kind = %err.kind(), error = %err, "Notification fetch failed");
            self.dispatch(HubIntent::LoadFailed {
                error: err.to_string(),
            });
        }
        err
    }

    fn settle(
        &self,
        mutation: MutationId,
        result: Result<(), SyncError>,
        action: &str,
    ) -> Result<(), SyncError> {
        match result {
            Ok(()) => {
                self.dispatch(HubIntent::MutationConfirmed { mutation });
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::Cancelled => Err(err),
            Err(err) => {
                tracing::warn!(
                    mutation = mutation.0,
                    kind = %err.kind(),
                    error = %err,
                    "Rolling back optimistic mutation"
                );
                let message = format!("Failed to {action}: {err}");
                self.dispatch(HubIntent::MutationFailed {
                    mutation,
                    error: message.clone(),
                });
                if !self.lifecycle.is_disposed() {
                    self.notifier.notify_user(&message);
                }
                Err(err)
            }
        }
    }

    /// Sleep for `delay`; false once disposed.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => !self.lifecycle.is_disposed(),
            _ = self.lifecycle.disposed() => false,
        }
    }
}

async fn poll_loop(inner: Arc<HubInner>) {
    loop {
        if inner.lifecycle.is_disposed() {
            return;
        }
        // A failed cycle is already recorded in state; keep polling.
        let _ = inner.fetch_snapshot().await;

        let Some(interval) = inner.settings.poll_interval else {
            if inner.state.borrow().channel_mode == ChannelMode::Polling {
                inner.dispatch(HubIntent::ChannelChanged(ChannelMode::Idle));
            }
            return;
        };
        let pushing = inner.state.borrow().channel_mode == ChannelMode::Pushing;
        let wait = if pushing {
            interval.saturating_mul(inner.settings.push_poll_factor)
        } else {
            interval
        };
        if !inner.pause(wait).await {
            return;
        }
    }
}

async fn push_loop(inner: Arc<HubInner>, source: Arc<dyn PushSource>) {
    let mut failures = 0u32;
    let mut connected_before = false;

    while !inner.lifecycle.is_disposed() {
        match source.subscribe().await {
            Ok(mut events) => {
                failures = 0;
                inner.dispatch(HubIntent::ChannelChanged(ChannelMode::Pushing));
                tracing::info!("Push channel connected");
                if connected_before {
                    // Catch up on whatever was dropped while disconnected.
                    let _ = inner.fetch_snapshot().await;
                }
                connected_before = true;

                loop {
                    tokio::select! {
                        message = events.recv() => match message {
                            Some(message) => inner.dispatch(HubIntent::Remote(message)),
                            None => break,
                        },
                        _ = inner.lifecycle.disposed() => return,
                    }
                }
                tracing::info!("Push stream ended");
            }
            Err(err) => {
                tracing::warn!(kind = %err.kind(), error = %err, "Push subscription failed");
                failures = failures.saturating_add(1);
            }
        }

        inner.dispatch(HubIntent::ChannelChanged(inner.fallback_mode()));
        let delay = inner
            .policy
            .delay_for(failures.saturating_sub(1))
            .max(MIN_RECONNECT_DELAY);
        tracing::debug!(delay_ms = delay.as_millis() as u64, "Push channel reconnecting");
        if !inner.pause(delay).await {
            return;
        }
    }
}
