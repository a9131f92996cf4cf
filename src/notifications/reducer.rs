//! Reducer for the notification hub.
//!
//! Merges pull snapshots, push events and local optimistic edits into one
//! list. A local edit wins over incoming server data for the same id until
//! the server reports a modification newer than the edit.
//!
//! Each id keeps the record as it was before its oldest outstanding edit.
//! Rolling back one edit replays the remaining ones on top of that baseline,
//! so edits on the same id can fail or succeed in any order.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use super::intent::HubIntent;
use super::model::{Notification, PushEventKind, PushMessage};
use super::state::{HubState, MutationId, PendingChange, PendingEdit, PendingMutation};
use crate::mvi::Reducer;

pub struct HubReducer;

impl Reducer for HubReducer {
    type State = HubState;
    type Intent = HubIntent;

    fn reduce(mut state: Self::State, intent: Self::Intent) -> Self::State {
        match intent {
            HubIntent::LoadStarted => {
                state.loading = true;
            }

            HubIntent::SnapshotLoaded { items, page_size } => {
                state.loading = false;
                state.error = None;
                merge_snapshot(&mut state, items, page_size);
                finalize(&mut state);
            }

            HubIntent::PageLoaded { items } => {
                state.loading = false;
                for incoming in items {
                    upsert(&mut state, incoming);
                }
                finalize(&mut state);
            }

            HubIntent::LoadFailed { error } => {
                state.loading = false;
                state.error = Some(error);
            }

            HubIntent::Remote(message) => {
                apply_remote(&mut state, message);
                finalize(&mut state);
            }

            HubIntent::ChannelChanged(mode) => {
                state.channel_mode = mode;
            }

            HubIntent::MarkRead { mutation, ids, at } => {
                for id in ids {
                    let Some(item) = state.items.iter_mut().find(|n| n.id == id) else {
                        continue;
                    };
                    // Read on the server as far as we know: nothing to guard.
                    if item.read && !state.pending.contains_key(&id) {
                        continue;
                    }
                    let current = item.clone();
                    item.read = true;
                    record_edit(&mut state, id, current, mutation, PendingChange::Read, at);
                }
            }

            HubIntent::Remove { mutation, id, at } => {
                if let Some(pos) = state.items.iter().position(|n| n.id == id) {
                    let current = state.items.remove(pos);
                    record_edit(&mut state, id, current, mutation, PendingChange::Removed, at);
                }
            }

            HubIntent::MutationConfirmed { mutation } => {
                for edit in state.pending.values_mut().flat_map(|p| p.edits.iter_mut()) {
                    if edit.mutation == mutation {
                        edit.confirmed = true;
                    }
                }
            }

            HubIntent::MutationFailed { mutation, error } => {
                rollback(&mut state, mutation);
                state.error = Some(error);
                finalize(&mut state);
            }

            HubIntent::DismissError => {
                state.error = None;
            }
        }
        state
    }
}

/// Outcome of reconciling one incoming server record with local state.
enum Resolution {
    Accept(Notification),
    Discard,
}

fn resolve(pending: &mut HashMap<String, PendingMutation>, incoming: Notification) -> Resolution {
    let Some(local) = pending.get(&incoming.id) else {
        return Resolution::Accept(incoming);
    };
    let applied_at = local.applied_at;
    let confirmed = local.is_confirmed();
    let is_read_mark = !local.is_removal();

    // Server modified the record after our edit: the server wins.
    if incoming.server_time() > applied_at {
        pending.remove(&incoming.id);
        return Resolution::Accept(incoming);
    }

    if !is_read_mark {
        // Stale copy of something we removed locally.
        return Resolution::Discard;
    }

    let agreed = incoming.read;
    let mut merged = incoming;
    merged.read = true;
    if agreed && confirmed {
        pending.remove(&merged.id);
    }
    Resolution::Accept(merged)
}

fn upsert(state: &mut HubState, incoming: Notification) {
    let Resolution::Accept(record) = resolve(&mut state.pending, incoming) else {
        return;
    };
    match state.items.iter_mut().find(|n| n.id == record.id) {
        Some(existing) => *existing = record,
        None => state.items.push(record),
    }
}

/// Keep the most recently modified copy of each id.
fn dedup_latest(items: Vec<Notification>) -> Vec<Notification> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<Notification> = Vec::with_capacity(items.len());
    for item in items {
        match index.get(&item.id) {
            Some(&pos) => {
                if item.server_time() > out[pos].server_time() {
                    out[pos] = item;
                }
            }
            None => {
                index.insert(item.id.clone(), out.len());
                out.push(item);
            }
        }
    }
    out
}

/// A snapshot is authoritative for the time window it covers.
///
/// Local items missing from it survive when they are newer than the
/// snapshot's newest item, older than its oldest item on a full page, or
/// guarded by an unconfirmed optimistic edit.
fn merge_snapshot(state: &mut HubState, items: Vec<Notification>, page_size: usize) {
    let full_page = page_size > 0 && items.len() >= page_size;
    let newest = items.iter().map(|n| n.created_at).max();
    let oldest = items.iter().map(|n| n.created_at).min();
    let incoming = dedup_latest(items);
    let incoming_ids: HashSet<String> = incoming.iter().map(|n| n.id.clone()).collect();

    let mut merged = Vec::with_capacity(incoming.len() + state.items.len());
    for record in incoming {
        if let Resolution::Accept(n) = resolve(&mut state.pending, record) {
            merged.push(n);
        }
    }

    for local in std::mem::take(&mut state.items) {
        if incoming_ids.contains(&local.id) {
            continue;
        }
        let guarded = state.pending.get(&local.id).is_some_and(|p| !p.is_confirmed());
        let after_window = newest.is_some_and(|t| local.created_at > t);
        let before_window = full_page && oldest.is_some_and(|t| local.created_at < t);
        if guarded || after_window || before_window {
            merged.push(local);
        }
    }

    // A confirmed removal the server no longer reports is settled.
    state
        .pending
        .retain(|id, p| !(p.removal_confirmed() && !incoming_ids.contains(id)));

    state.items = merged;
}

fn apply_remote(state: &mut HubState, message: PushMessage) {
    match message.event {
        PushEventKind::Created | PushEventKind::Updated => upsert(state, message.notification),
        PushEventKind::Deleted => {
            let id = message.notification.id;
            state.items.retain(|n| n.id != id);
            state.pending.remove(&id);
        }
    }
}

fn record_edit(
    state: &mut HubState,
    id: String,
    current: Notification,
    mutation: MutationId,
    change: PendingChange,
    at: DateTime<Utc>,
) {
    let entry = state
        .pending
        .entry(id)
        .or_insert_with(|| PendingMutation::new(current, at));
    entry.edits.push(PendingEdit {
        mutation,
        change,
        confirmed: false,
    });
    entry.applied_at = entry.applied_at.max(at);
}

fn rollback(state: &mut HubState, mutation: MutationId) {
    let ids: Vec<String> = state
        .pending
        .iter()
        .filter(|(_, p)| p.involves(mutation))
        .map(|(id, _)| id.clone())
        .collect();

    for id in ids {
        let Some(mut entry) = state.pending.remove(&id) else {
            continue;
        };
        let before = entry.edits.len();
        entry.edits.retain(|e| e.mutation != mutation || e.confirmed);
        if entry.edits.len() != before {
            replay(&mut state.items, &entry);
        }
        if !entry.edits.is_empty() {
            state.pending.insert(id, entry);
        }
    }
}

/// Show the baseline with the remaining edits applied on top.
fn replay(items: &mut Vec<Notification>, entry: &PendingMutation) {
    let id = entry.baseline.id.as_str();
    if entry.is_removal() {
        items.retain(|n| n.id != id);
        return;
    }
    let read = entry.baseline.read || entry.edits.iter().any(|e| e.change == PendingChange::Read);
    match items.iter_mut().find(|n| n.id == id) {
        Some(item) => item.read = read,
        None => {
            let mut restored = entry.baseline.clone();
            restored.read = read;
            items.push(restored);
        }
    }
}

/// Re-sort newest first, enforce uniqueness and the retention cap, and
/// drop read marks for ids that are no longer listed.
fn finalize(state: &mut HubState) {
    state
        .items
        .sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

    let mut seen = HashSet::new();
    state.items.retain(|n| seen.insert(n.id.clone()));

    if state.items.len() > state.max_items {
        state.items.truncate(state.max_items);
    }

    let listed: HashSet<&str> = state.items.iter().map(|n| n.id.as_str()).collect();
    state
        .pending
        .retain(|id, p| p.is_removal() || listed.contains(id.as_str()));
}
