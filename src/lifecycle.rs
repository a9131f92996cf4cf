//! Component lifecycle: a dispose flag plus a wake-up for pending timers.
//!
//! A component owns one [`Lifecycle`]; its background tasks and scheduled
//! retries hold clones and stop as soon as [`Lifecycle::dispose`] runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Clone, Default)]
pub struct Lifecycle {
    disposed: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark disposed and wake every waiter. Idempotent.
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            tracing::debug!("Lifecycle disposed");
            self.notify.notify_waiters();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Resolves once [`dispose`](Self::dispose) has been called.
    pub async fn disposed(&self) {
        // Register with Notify before checking the flag so a dispose()
        // between the check and the await is not lost.
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_disposed() {
            return;
        }
        notified.await;
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
