//! Intent / reducer plumbing shared by stateful components.
//!
//! A component owns a `watch::Sender<State>`. Local actions, remote
//! snapshots, push events and call outcomes are all expressed as intents
//! and applied through [`dispatch`], one at a time, in arrival order.
//! Subscribers only ever see states a reducer produced.

use tokio::sync::watch;

/// Something that can change a component's state.
pub trait Intent: Send + 'static {}

/// Published state of a component.
///
/// `PartialEq` lets [`dispatch`] skip publishing no-op transitions.
pub trait ViewState: Clone + PartialEq + Default + Send + Sync + 'static {}

pub trait Reducer {
    type State: ViewState;
    type Intent: Intent;

    /// `(state, intent) -> state`. Must not read the clock or any other
    /// ambient input; whatever it needs travels inside the intent.
    fn reduce(state: Self::State, intent: Self::Intent) -> Self::State;
}

/// Apply `intent` to the state held by `sender`. Receivers are woken only
/// when the state actually changed. Returns whether it did.
pub fn dispatch<R: Reducer>(sender: &watch::Sender<R::State>, intent: R::Intent) -> bool {
    sender.send_if_modified(|state| {
        let current = std::mem::take(state);
        let next = R::reduce(current.clone(), intent);
        let changed = next != current;
        *state = next;
        changed
    })
}
