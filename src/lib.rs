//! Client-side state synchronization against an unreliable backend.
//!
//! Retry with backoff, a TTL + schema-versioned cache, a notification hub
//! merging push and poll channels with optimistic edits, and a one-shot
//! locale preference redirect.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod logging;
pub mod mvi;
pub mod notifications;
pub mod preference;
pub mod retry;
pub mod session;
pub mod sse;
pub mod theme;

pub use cache::{FileStore, KvStore, MemoryStore, TtlVersionedCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ConfigError};
pub use error::{ErrorKind, SyncError};
pub use http::HttpApi;
pub use lifecycle::Lifecycle;
pub use notifications::{HubSettings, HubState, Notification, NotificationHub};
pub use preference::{LocaleRouting, PreferenceReconciler, ReconcileOutcome};
pub use retry::{RetryExecutor, RetryPolicy, RetryState};
pub use session::SessionStore;
pub use theme::ThemeLoader;
