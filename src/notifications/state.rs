//! State for the notification hub.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::model::Notification;
use crate::mvi::ViewState;

/// Retention cap used when none is configured.
pub const DEFAULT_MAX_ITEMS: usize = 200;

/// Which channels are feeding the hub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelMode {
    #[default]
    Idle,
    Polling,
    Pushing,
}

/// Identifies one optimistic mutation (possibly covering several ids).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MutationId(pub u64);

/// Which optimistic edit was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingChange {
    Read,
    Removed,
}

/// One outstanding optimistic edit on an id.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEdit {
    pub mutation: MutationId,
    pub change: PendingChange,
    /// The API call succeeded; this edit can no longer be rolled back.
    pub confirmed: bool,
}

/// Local edits on one id not yet superseded by newer server data.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation {
    /// The record as it was before the oldest outstanding edit.
    pub baseline: Notification,
    /// Oldest first.
    pub edits: Vec<PendingEdit>,
    /// When the most recent edit was applied.
    pub applied_at: DateTime<Utc>,
}

impl PendingMutation {
    pub(crate) fn new(baseline: Notification, applied_at: DateTime<Utc>) -> Self {
        Self {
            baseline,
            edits: Vec::new(),
            applied_at,
        }
    }

    /// Every outstanding edit has been accepted by the server.
    pub fn is_confirmed(&self) -> bool {
        self.edits.iter().all(|e| e.confirmed)
    }

    pub fn is_removal(&self) -> bool {
        self.edits.iter().any(|e| e.change == PendingChange::Removed)
    }

    pub fn removal_confirmed(&self) -> bool {
        self.edits
            .iter()
            .any(|e| e.change == PendingChange::Removed && e.confirmed)
    }

    pub fn involves(&self, mutation: MutationId) -> bool {
        self.edits.iter().any(|e| e.mutation == mutation)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HubState {
    /// Newest first by `created_at`, unique by id.
    pub items: Vec<Notification>,
    pub loading: bool,
    pub error: Option<String>,
    pub channel_mode: ChannelMode,
    pub(crate) pending: HashMap<String, PendingMutation>,
    pub(crate) max_items: usize,
}

impl Default for HubState {
    fn default() -> Self {
        Self::with_max_items(DEFAULT_MAX_ITEMS)
    }
}

impl ViewState for HubState {}

impl HubState {
    pub fn with_max_items(max_items: usize) -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
            channel_mode: ChannelMode::Idle,
            pending: HashMap::new(),
            max_items: max_items.max(1),
        }
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Number of unread items, derived from `items` every time.
    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.read).count()
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Pending optimistic mutation guarding `id`, if any.
    pub fn pending(&self, id: &str) -> Option<&PendingMutation> {
        self.pending.get(id)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
