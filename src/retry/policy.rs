use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::SyncError;

/// Decides whether a failure is worth another attempt.
pub type RetryPredicate = Arc<dyn Fn(&SyncError) -> bool + Send + Sync>;

/// Immutable retry configuration.
///
/// `max_attempts` counts *retries*: a permanently failing operation is
/// called `max_attempts + 1` times.
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub exponential: bool,
    /// Upper bound applied to computed delays.
    pub max_delay: Option<Duration>,
    is_retryable: RetryPredicate,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, exponential: bool) -> Self {
        Self {
            max_attempts,
            base_delay,
            exponential,
            max_delay: None,
            is_retryable: Arc::new(|_| true),
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, false)
    }

    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&SyncError) -> bool + Send + Sync + 'static,
    {
        self.is_retryable = Arc::new(predicate);
        self
    }

    /// Retry only transient failures (network, timeout, 5xx, 408/429).
    pub fn transient_only(self) -> Self {
        self.with_predicate(SyncError::is_transient)
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn is_retryable(&self, error: &SyncError) -> bool {
        (self.is_retryable)(error)
    }

    /// Delay before the retry with zero-based index `retry`.
    ///
    /// Exponential: `base * 2^retry`, so the first retry waits `base`.
    /// Constant: always `base`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let delay = if self.exponential {
            2u32.checked_pow(retry)
                .and_then(|factor| self.base_delay.checked_mul(factor))
                .unwrap_or(Duration::MAX)
        } else {
            self.base_delay
        };
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), true)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("exponential", &self.exponential)
            .field("max_delay", &self.max_delay)
            .finish_non_exhaustive()
    }
}
