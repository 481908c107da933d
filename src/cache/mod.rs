//! Block Cache Module
//!
//! Capacity-bounded, reference-counted key → value cache.
//!
//! ## Responsibilities
//! - Charge-based capacity accounting (charge is caller-defined, e.g. bytes)
//! - Strict LRU eviction of entries nobody is holding
//! - Precise lifetime: each entry's deleter runs exactly once, after it has
//!   left the cache AND its last handle was released
//! - Low lock contention through hash-partitioned shards
//!
//! ## Entry States
//! ```text
//!             insert / lookup                 release (last handle)
//!   ┌────────────┐ ─────────────► ┌──────────┐ ──────────────────► ┌──────────┐
//!   │  LRU list  │                │  in-use  │                     │ LRU list │
//!   │ refs == 0  │ ◄───────────── │ refs > 0 │                     │ refs == 0│
//!   └────────────┘                └──────────┘                     └──────────┘
//!         │ evict / erase / prune       │ erase / superseded
//!         ▼                             ▼
//!     deleter runs               detached; deleter runs on last release
//! ```
//!
//! ## Handles
//! `lookup` and `insert` return a `Handle`, which pins the entry until it is
//! passed back to `release`. Handles are not `Clone` and `release` consumes
//! them, so a handle cannot be released twice. `HandleGuard` wraps the same
//! contract in a scope.

mod lru;
mod sharded;

use std::fmt;
use std::sync::Arc;

pub use lru::LruCache;
pub use sharded::ShardedLruCache;

/// Upper bound on `cache_shard_bits`
pub const MAX_SHARD_BITS: u32 = 8;

/// Callback run exactly once when an entry is finally freed
pub type Deleter<V> = Box<dyn FnOnce(&[u8], &V) + Send>;

/// Box a closure as a `Deleter`
pub fn deleter<V, F>(f: F) -> Deleter<V>
where
    F: FnOnce(&[u8], &V) + Send + 'static,
{
    Box::new(f)
}

/// Deleter that does nothing beyond dropping the value
pub fn noop_deleter<V>() -> Deleter<V> {
    Box::new(|_, _| {})
}

/// Build the default cache: sharded LRU, 16 shards
pub fn new_lru_cache<V>(capacity: usize) -> Arc<dyn Cache<V>>
where
    V: Send + Sync + 'static,
{
    Arc::new(ShardedLruCache::new(capacity))
}

/// Reference-counted cache interface
///
/// Every `Handle` returned by `insert` or `lookup` must be passed to
/// `release` on the same cache exactly once.
pub trait Cache<V>: Send + Sync {
    /// Insert `key → value` with the given charge and return a handle to it.
    ///
    /// A previous entry under the same key is detached from the index; its
    /// deleter runs once its own handles are released.
    fn insert(&self, key: &[u8], value: V, charge: usize, deleter: Deleter<V>) -> Handle<V>;

    /// Pin the entry for `key`, or `None` on a miss
    fn lookup(&self, key: &[u8]) -> Option<Handle<V>>;

    /// Drop one reference obtained from `insert` or `lookup`
    fn release(&self, handle: Handle<V>);

    /// Value behind a live handle
    fn value<'h>(&self, handle: &'h Handle<V>) -> &'h V {
        handle.value()
    }

    /// Remove `key` from the index. The entry itself lives on until its
    /// outstanding handles are released.
    fn erase(&self, key: &[u8]);

    /// A fresh id, unique for the lifetime of this cache. Clients sharing a
    /// cache prefix their keys with one to partition the key space.
    fn new_id(&self) -> u64;

    /// Evict every entry that is not currently pinned
    fn prune(&self);

    /// Sum of the charges of all indexed entries
    fn total_charge(&self) -> usize;
}

// =============================================================================
// Handle
// =============================================================================

/// One live reference to a cache entry
#[must_use = "a cache handle pins its entry until passed to `release`"]
pub struct Handle<V> {
    /// Shard owning the entry
    pub(crate) shard: usize,

    /// Arena slot of the entry inside its shard
    pub(crate) slot: usize,

    pub(crate) value: Arc<V>,
}

impl<V> Handle<V> {
    pub fn value(&self) -> &V {
        &self.value
    }
}

impl<V> fmt::Debug for Handle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("shard", &self.shard)
            .field("slot", &self.slot)
            .finish()
    }
}

/// Scoped handle: released when dropped
pub struct HandleGuard<'c, V> {
    cache: &'c dyn Cache<V>,
    handle: Option<Handle<V>>,
}

impl<'c, V> HandleGuard<'c, V> {
    pub fn new(cache: &'c dyn Cache<V>, handle: Handle<V>) -> Self {
        Self {
            cache,
            handle: Some(handle),
        }
    }

    pub fn value(&self) -> &V {
        // Only `into_handle` takes the handle, and it consumes the guard.
        match &self.handle {
            Some(handle) => handle.value(),
            None => unreachable!("guard without handle"),
        }
    }

    /// Give up the guard and take back manual control of the handle
    pub fn into_handle(mut self) -> Handle<V> {
        match self.handle.take() {
            Some(handle) => handle,
            None => unreachable!("guard without handle"),
        }
    }
}

impl<V> std::ops::Deref for HandleGuard<'_, V> {
    type Target = V;

    fn deref(&self) -> &V {
        self.value()
    }
}

impl<V> Drop for HandleGuard<'_, V> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.cache.release(handle);
        }
    }
}
