//! Retry with configurable backoff.
//!
//! [`RetryExecutor`] runs an async operation and re-runs it on failure
//! according to a [`RetryPolicy`]. Every other remote call in the crate
//! goes through it.

mod executor;
mod policy;

pub use executor::{RetryExecutor, RetryState};
pub use policy::{RetryPolicy, RetryPredicate};
