//! Locale preference reconciliation.

mod locale;
mod reconciler;

pub use locale::{localized_path, LocaleRouting, PrefixMode};
pub use reconciler::{
    LocationContext, Navigator, PreferenceApi, PreferenceReconciler, PreferenceRecord,
    ReconcileOutcome, RedirectHandle, RedirectState,
};
