//! Boundary error type for every remote or storage failure.
//!
//! Whatever shape a failure has where it is caught (reqwest error, HTTP
//! status, serde error, timeout), it is normalised into a [`SyncError`]
//! before retry or rollback logic looks at it.

use std::fmt;
use std::sync::Arc;

/// Classification used by retry predicates and rollback handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection refused, reset, DNS failure.
    Network,
    /// Request exceeded its bounded timeout.
    Timeout,
    /// Upstream answered with a 5xx status.
    Server,
    /// Upstream rejected the request (4xx other than the ones below).
    Client,
    /// 401 / 403.
    Unauthorized,
    /// 404.
    NotFound,
    /// Response body could not be decoded.
    Decode,
    /// Durable store failure.
    Storage,
    /// A scheduled retry was cancelled because its owner was disposed.
    Cancelled,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Stable identifier used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Server => "server",
            ErrorKind::Client => "client",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Decode => "decode",
            ErrorKind::Storage => "storage",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged error `{kind, message, cause}` shared by all components.
///
/// Cheap to clone so it can live in observable state (`RetryState`,
/// hub error field) while also being returned to the caller.
#[derive(Debug, Clone)]
pub struct SyncError {
    kind: ErrorKind,
    message: String,
    status: Option<u16>,
    cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl SyncError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            cause: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn timeout(after: std::time::Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("request timed out after {}ms", after.as_millis()),
        )
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "operation cancelled")
    }

    /// Classify an HTTP status the way the retry layer expects.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => ErrorKind::Unauthorized,
            404 => ErrorKind::NotFound,
            400..=499 => ErrorKind::Client,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Internal,
        };
        Self {
            kind,
            message: message.into(),
            status: Some(status),
            cause: None,
        }
    }

    /// Attach the underlying error.
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Network failures, timeouts, 5xx, 408 and 429 are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self.kind {
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::Server => true,
            ErrorKind::Client => matches!(self.status, Some(408 | 429)),
            _ => false,
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} error ({}): {}", self.kind, status, self.message),
            None => write!(f, "{} error: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_decode() {
            ErrorKind::Decode
        } else if let Some(status) = err.status() {
            return SyncError::from_status(status.as_u16(), err.to_string()).with_cause(err);
        } else if err.is_connect() || err.is_request() {
            ErrorKind::Network
        } else {
            ErrorKind::Internal
        };
        SyncError::new(kind, err.to_string()).with_cause(err)
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::decode(err.to_string()).with_cause(err)
    }
}
