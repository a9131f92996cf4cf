use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::policy::RetryPolicy;
use crate::error::SyncError;
use crate::lifecycle::Lifecycle;

/// Observable progress of the current `execute` call.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    /// Index of the attempt running or scheduled next (0 = initial attempt).
    pub attempt: u32,
    /// True only while a retry is scheduled and waiting for its delay.
    pub is_retrying: bool,
    /// Most recent failure, set as soon as it happens.
    pub last_error: Option<SyncError>,
}

/// Runs async operations and retries failures per [`RetryPolicy`].
///
/// Clones share the same [`RetryState`], so a clone can observe an
/// in-flight call. Only scheduled retries can be cancelled (through the
/// attached [`Lifecycle`]); a running attempt is never interrupted.
#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    state: Arc<Mutex<RetryState>>,
    lifecycle: Option<Lifecycle>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: Arc::new(Mutex::new(RetryState::default())),
            lifecycle: None,
        }
    }

    /// Cancel pending retry delays when `lifecycle` is disposed.
    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Snapshot of the current retry state.
    pub fn state(&self) -> RetryState {
        self.state.lock().clone()
    }

    /// Clear attempt counter, retry flag and last error.
    ///
    /// Must not be called while an `execute` is in flight.
    pub fn reset(&self) {
        *self.state.lock() = RetryState::default();
    }

    /// Run `operation`, retrying failures until it succeeds, the policy
    /// refuses another retry, or the owning lifecycle is disposed.
    ///
    /// The final error is the last one the operation produced, except
    /// when a pending retry is cancelled, which yields
    /// [`ErrorKind::Cancelled`](crate::error::ErrorKind::Cancelled).
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        self.reset();
        let mut retry = 0u32;

        loop {
            let err = match operation().await {
                Ok(value) => {
                    self.state.lock().is_retrying = false;
                    return Ok(value);
                }
                Err(err) => err,
            };

            self.state.lock().last_error = Some(err.clone());

            if retry >= self.policy.max_attempts || !self.policy.is_retryable(&err) {
                self.state.lock().is_retrying = false;
                if retry > 0 {
                    tracing::warn!(
                        attempts = retry + 1,
                        kind = %err.kind(),
                        error = %err,
                        "Retries exhausted"
                    );
                }
                return Err(err);
            }

            let delay = self.policy.delay_for(retry);
            {
                let mut state = self.state.lock();
                state.attempt = retry + 1;
                state.is_retrying = true;
            }
            tracing::debug!(
                retry = retry + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Scheduling retry"
            );

            if !self.wait(delay).await {
                self.state.lock().is_retrying = false;
                return Err(SyncError::cancelled());
            }

            self.state.lock().is_retrying = false;
            retry += 1;
        }
    }

    /// Sleep for `delay`; false if the lifecycle was disposed first.
    async fn wait(&self, delay: Duration) -> bool {
        let Some(lifecycle) = &self.lifecycle else {
            tokio::time::sleep(delay).await;
            return true;
        };
        if lifecycle.is_disposed() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = lifecycle.disposed() => false,
        }
    }
}
