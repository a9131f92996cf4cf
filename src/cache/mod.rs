//! Local persistence for server-owned records.
//!
//! [`KvStore`] is the durable key-value boundary ([`MemoryStore`] and
//! [`FileStore`] implement it); [`TtlVersionedCache`] memoises one record
//! per slot on top of it.

mod store;
mod ttl;

pub use store::{FileStore, KvStore, MemoryStore, StoreError};
pub use ttl::{CacheEntry, Invalidation, TtlVersionedCache};
