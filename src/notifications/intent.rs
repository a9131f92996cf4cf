//! Intents for the notification hub.

use chrono::{DateTime, Utc};

use super::model::{Notification, PushMessage};
use super::state::{ChannelMode, MutationId};
use crate::mvi::Intent;

/// Tagged operations applied to [`HubState`](super::HubState) in arrival order.
#[derive(Debug, Clone)]
pub enum HubIntent {
    /// A pull-channel fetch started.
    LoadStarted,

    /// First-page snapshot from the pull channel.
    SnapshotLoaded {
        items: Vec<Notification>,
        /// Page size requested; a snapshot this long may have more behind it.
        page_size: usize,
    },

    /// Additional page; merged without inferring deletions.
    PageLoaded { items: Vec<Notification> },

    /// The pull channel gave up after retries.
    LoadFailed { error: String },

    /// Incremental push-channel message.
    Remote(PushMessage),

    ChannelChanged(ChannelMode),

    /// Optimistic read mark for `ids`, applied at local time `at`.
    MarkRead {
        mutation: MutationId,
        ids: Vec<String>,
        at: DateTime<Utc>,
    },

    /// Optimistic removal.
    Remove {
        mutation: MutationId,
        id: String,
        at: DateTime<Utc>,
    },

    /// The API call behind `mutation` succeeded.
    MutationConfirmed { mutation: MutationId },

    /// The API call behind `mutation` failed for good; roll it back.
    MutationFailed { mutation: MutationId, error: String },

    /// User dismissed the error message.
    DismissError,
}

impl Intent for HubIntent {}
