//! Sharded LRU cache
//!
//! Splits the key space across `2^shard_bits` independently locked
//! `LruCache` shards so concurrent readers rarely contend on one mutex.
//!
//! ```text
//!   key ──crc32──► top shard_bits ──► shard i  (capacity ⌈C / shards⌉)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;

use crate::config::Config;

use super::{Cache, Deleter, Handle, HandleGuard, LruCache, MAX_SHARD_BITS};

/// Default log2 of the shard count (16 shards)
pub const DEFAULT_SHARD_BITS: u32 = 4;

/// LRU cache partitioned by key hash
///
/// Capacity is split evenly per shard, so eviction order is strict LRU
/// within a shard and only approximately LRU across the whole cache.
pub struct ShardedLruCache<V> {
    shards: Box<[CachePadded<LruCache<V>>]>,
    shard_bits: u32,

    /// Shared by all shards so ids are unique cache-wide
    last_id: AtomicU64,
}

impl<V> ShardedLruCache<V>
where
    V: Send + Sync + 'static,
{
    /// 16 shards sharing `capacity`
    pub fn new(capacity: usize) -> Self {
        Self::with_shard_bits(capacity, DEFAULT_SHARD_BITS)
    }

    /// `2^shard_bits` shards sharing `capacity`
    pub fn with_shard_bits(capacity: usize, shard_bits: u32) -> Self {
        let shard_bits = shard_bits.min(MAX_SHARD_BITS);
        let num_shards = 1usize << shard_bits;
        let per_shard = capacity.div_ceil(num_shards);

        let shards = (0..num_shards)
            .map(|shard| CachePadded::new(LruCache::for_shard(per_shard, shard)))
            .collect();

        Self {
            shards,
            shard_bits,
            last_id: AtomicU64::new(0),
        }
    }

    /// Block cache sized and sharded per `config`
    pub fn from_config(config: &Config) -> Self {
        Self::with_shard_bits(config.block_cache_capacity, config.cache_shard_bits)
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Number of indexed entries across all shards
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert<F>(&self, key: &[u8], value: V, charge: usize, deleter: F) -> Handle<V>
    where
        F: FnOnce(&[u8], &V) + Send + 'static,
    {
        self.shard(key).insert(key, value, charge, deleter)
    }

    pub fn lookup(&self, key: &[u8]) -> Option<Handle<V>> {
        self.shard(key).lookup(key)
    }

    pub fn release(&self, handle: Handle<V>) {
        self.shards[handle.shard].release(handle)
    }

    pub fn erase(&self, key: &[u8]) {
        self.shard(key).erase(key)
    }

    pub fn new_id(&self) -> u64 {
        self.last_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn prune(&self) {
        for shard in self.shards.iter() {
            shard.prune();
        }
    }

    pub fn total_charge(&self) -> usize {
        self.shards.iter().map(|shard| shard.total_charge()).sum()
    }

    /// `lookup` returning a guard that releases on drop
    pub fn lookup_guard(&self, key: &[u8]) -> Option<HandleGuard<'_, V>> {
        self.lookup(key).map(|handle| HandleGuard::new(self, handle))
    }

    /// `insert` returning a guard that releases on drop
    pub fn insert_guard<F>(&self, key: &[u8], value: V, charge: usize, deleter: F) -> HandleGuard<'_, V>
    where
        F: FnOnce(&[u8], &V) + Send + 'static,
    {
        let handle = self.insert(key, value, charge, deleter);
        HandleGuard::new(self, handle)
    }

    fn shard(&self, key: &[u8]) -> &LruCache<V> {
        &self.shards[self.shard_index(key)]
    }

    fn shard_index(&self, key: &[u8]) -> usize {
        if self.shard_bits == 0 {
            return 0;
        }
        (crc32fast::hash(key) >> (32 - self.shard_bits)) as usize
    }
}

impl<V> Cache<V> for ShardedLruCache<V>
where
    V: Send + Sync + 'static,
{
    fn insert(&self, key: &[u8], value: V, charge: usize, deleter: Deleter<V>) -> Handle<V> {
        self.shard(key).insert_boxed(key, value, charge, deleter)
    }

    fn lookup(&self, key: &[u8]) -> Option<Handle<V>> {
        ShardedLruCache::lookup(self, key)
    }

    fn release(&self, handle: Handle<V>) {
        ShardedLruCache::release(self, handle)
    }

    fn erase(&self, key: &[u8]) {
        ShardedLruCache::erase(self, key)
    }

    fn new_id(&self) -> u64 {
        ShardedLruCache::new_id(self)
    }

    fn prune(&self) {
        ShardedLruCache::prune(self)
    }

    fn total_charge(&self) -> usize {
        ShardedLruCache::total_charge(self)
    }
}
