//! Collaborator seams for the notification hub.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::model::{ListQuery, Notification, PushMessage};
use crate::error::SyncError;

/// Backend notification endpoints. Mutations are idempotent: repeating one
/// on an already-processed id succeeds.
#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn list(&self, query: &ListQuery) -> Result<Vec<Notification>, SyncError>;
    async fn mark_read(&self, id: &str) -> Result<(), SyncError>;
    async fn mark_all_read(&self) -> Result<(), SyncError>;
    async fn delete(&self, id: &str) -> Result<(), SyncError>;
}

/// Long-lived push subscription. Delivery is at-most-once; the receiver
/// closing means the stream ended and the hub should reconnect.
#[async_trait]
pub trait PushSource: Send + Sync {
    async fn subscribe(&self) -> Result<mpsc::Receiver<PushMessage>, SyncError>;
}

/// User-facing feedback for failures the user should know about.
pub trait UserNotifier: Send + Sync {
    fn notify_user(&self, message: &str);
}

/// Writes user feedback to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl UserNotifier for LogNotifier {
    fn notify_user(&self, message: &str) {
        tracing::warn!(text = message, "User notification");
    }
}
