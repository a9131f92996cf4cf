//! Notification synchronization: pull snapshots and push events merged
//! into one list, with optimistic read marks and removals.

mod api;
mod hub;
mod intent;
mod model;
mod reducer;
mod state;

pub use api::{LogNotifier, NotificationApi, PushSource, UserNotifier};
pub use hub::{HubSettings, NotificationHub};
pub use intent::HubIntent;
pub use model::{ListQuery, Notification, NotificationKind, PushEventKind, PushMessage};
pub use reducer::HubReducer;
pub use state::{
    ChannelMode, HubState, MutationId, PendingChange, PendingEdit, PendingMutation,
    DEFAULT_MAX_ITEMS,
};
