//! LRU cache shard
//!
//! One independently locked partition of the block cache.
//!
//! ## Layout
//! - `slots`: entry arena addressed by index; freed slots are recycled
//! - `index`: key → slot, for entries still in the cache
//! - `in_use`: entries with at least one outstanding handle (never evicted)
//! - `lru`: entries nobody holds, oldest at the head
//!
//! Both lists are doubly linked through `prev`/`next` slot indices stored in
//! the entries, giving O(1) move and unlink without raw pointers.
//!
//! An entry is in exactly one list while indexed: `lru` if `refs == 0`,
//! `in_use` otherwise. Detached entries (erased or superseded while held)
//! are in neither list and are freed by their last release.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, trace};

use super::{Cache, Deleter, Handle, HandleGuard};

/// Single-shard LRU cache
///
/// Dropping the cache while handles are outstanding is a contract violation:
/// it trips a debug assertion, is logged at ERROR, and the deleters of the
/// still-pinned entries never run.
pub struct LruCache<V> {
    state: Mutex<LruState<V>>,

    /// Shard number stamped into handles
    shard: usize,

    last_id: AtomicU64,
}

impl<V> LruCache<V>
where
    V: Send + Sync + 'static,
{
    /// Create a standalone cache holding up to `capacity` total charge.
    /// A capacity of 0 disables caching: entries live only while held.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::for_shard(capacity, 0)
    }

    pub(crate) fn for_shard(capacity: usize, shard: usize) -> Self {
        Self {
            state: Mutex::new(LruState::new(capacity)),
            shard,
            last_id: AtomicU64::new(0),
        }
    }

    pub fn insert<F>(&self, key: &[u8], value: V, charge: usize, deleter: F) -> Handle<V>
    where
        F: FnOnce(&[u8], &V) + Send + 'static,
    {
        self.insert_boxed(key, value, charge, Box::new(deleter))
    }

    pub(crate) fn insert_boxed(
        &self,
        key: &[u8],
        value: V,
        charge: usize,
        deleter: Deleter<V>,
    ) -> Handle<V> {
        let value = Arc::new(value);
        let mut dead = Vec::new();
        let slot = {
            let mut state = self.state.lock();
            state.insert(key, Arc::clone(&value), charge, deleter, &mut dead)
        };
        reap(dead);

        Handle {
            shard: self.shard,
            slot,
            value,
        }
    }

    pub fn lookup(&self, key: &[u8]) -> Option<Handle<V>> {
        let (slot, value) = self.state.lock().lookup(key)?;
        Some(Handle {
            shard: self.shard,
            slot,
            value,
        })
    }

    pub fn release(&self, handle: Handle<V>) {
        debug_assert_eq!(handle.shard, self.shard, "handle released on the wrong shard");
        let mut dead = Vec::new();
        self.state.lock().unref(handle.slot, &mut dead);
        reap(dead);
    }

    pub fn erase(&self, key: &[u8]) {
        let mut dead = Vec::new();
        self.state.lock().erase(key, &mut dead);
        reap(dead);
    }

    pub fn prune(&self) {
        let mut dead = Vec::new();
        self.state.lock().prune(&mut dead);
        reap(dead);
    }

    pub fn total_charge(&self) -> usize {
        self.state.lock().usage
    }

    pub fn new_id(&self) -> u64 {
        self.last_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    /// Number of indexed entries
    pub fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
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
}

impl<V> Cache<V> for LruCache<V>
where
    V: Send + Sync + 'static,
{
    fn insert(&self, key: &[u8], value: V, charge: usize, deleter: Deleter<V>) -> Handle<V> {
        self.insert_boxed(key, value, charge, deleter)
    }

    fn lookup(&self, key: &[u8]) -> Option<Handle<V>> {
        LruCache::lookup(self, key)
    }

    fn release(&self, handle: Handle<V>) {
        LruCache::release(self, handle)
    }

    fn erase(&self, key: &[u8]) {
        LruCache::erase(self, key)
    }

    fn new_id(&self) -> u64 {
        LruCache::new_id(self)
    }

    fn prune(&self) {
        LruCache::prune(self)
    }

    fn total_charge(&self) -> usize {
        LruCache::total_charge(self)
    }
}

impl<V> Drop for LruCache<V> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.in_use.len > 0 {
            error!(
                shard = self.shard,
                pinned = state.in_use.len,
                "cache dropped with outstanding handles"
            );
            if !std::thread::panicking() {
                debug_assert!(
                    false,
                    "cache dropped with {} outstanding handles",
                    state.in_use.len
                );
            }
        }

        let mut dead = Vec::new();
        state.prune(&mut dead);
        reap(dead);
    }
}

// =============================================================================
// Shard State (guarded by the shard mutex)
// =============================================================================

struct Entry<V> {
    key: Vec<u8>,
    value: Arc<V>,
    deleter: Deleter<V>,
    charge: usize,

    /// Outstanding handles
    refs: u32,

    /// Still reachable through `index`
    in_cache: bool,

    prev: Option<usize>,
    next: Option<usize>,
}

/// An entry removed from the arena whose deleter is still owed
struct Dead<V> {
    key: Vec<u8>,
    value: Arc<V>,
    deleter: Deleter<V>,
}

/// Run deleters. Called only after the shard lock is released.
fn reap<V>(dead: Vec<Dead<V>>) {
    for entry in dead {
        (entry.deleter)(&entry.key, &entry.value);
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct List {
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

#[derive(Debug, Clone, Copy)]
enum Which {
    Lru,
    InUse,
}

struct LruState<V> {
    capacity: usize,

    /// Sum of charges of indexed entries
    usage: usize,

    slots: Vec<Option<Entry<V>>>,
    free_slots: Vec<usize>,

    index: HashMap<Vec<u8>, usize>,

    lru: List,
    in_use: List,
}

impl<V> LruState<V> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            usage: 0,
            slots: Vec::new(),
            free_slots: Vec::new(),
            index: HashMap::new(),
            lru: List::default(),
            in_use: List::default(),
        }
    }

    fn insert(
        &mut self,
        key: &[u8],
        value: Arc<V>,
        charge: usize,
        deleter: Deleter<V>,
        dead: &mut Vec<Dead<V>>,
    ) -> usize {
        let slot = self.alloc(Entry {
            key: key.to_vec(),
            value,
            deleter,
            charge,
            refs: 1, // the returned handle
            in_cache: false,
            prev: None,
            next: None,
        });

        if self.capacity > 0 {
            self.entry_mut(slot).in_cache = true;
            self.push_back(Which::InUse, slot);
            self.usage += charge;
            if let Some(old) = self.index.insert(key.to_vec(), slot) {
                self.finish_erase(old, dead);
            }
        }
        // capacity == 0: never indexed, freed on release

        while self.usage > self.capacity {
            let Some(oldest) = self.lru.head else {
                break;
            };
            let removed = match &self.slots[oldest] {
                Some(entry) => self.index.remove(entry.key.as_slice()),
                None => None,
            };
            debug_assert_eq!(removed, Some(oldest));
            trace!(slot = oldest, usage = self.usage, capacity = self.capacity, "evicting");
            self.finish_erase(oldest, dead);
        }

        slot
    }

    fn lookup(&mut self, key: &[u8]) -> Option<(usize, Arc<V>)> {
        let slot = *self.index.get(key)?;
        self.add_ref(slot);
        Some((slot, Arc::clone(&self.entry(slot).value)))
    }

    fn erase(&mut self, key: &[u8], dead: &mut Vec<Dead<V>>) {
        if let Some(slot) = self.index.remove(key) {
            self.finish_erase(slot, dead);
        }
    }

    fn prune(&mut self, dead: &mut Vec<Dead<V>>) {
        while let Some(slot) = self.lru.head {
            let removed = match &self.slots[slot] {
                Some(entry) => self.index.remove(entry.key.as_slice()),
                None => None,
            };
            debug_assert_eq!(removed, Some(slot));
            self.finish_erase(slot, dead);
        }
    }

    fn add_ref(&mut self, slot: usize) {
        let (refs, in_cache) = {
            let entry = self.entry(slot);
            (entry.refs, entry.in_cache)
        };
        if refs == 0 && in_cache {
            self.unlink(Which::Lru, slot);
            self.push_back(Which::InUse, slot);
        }
        self.entry_mut(slot).refs += 1;
    }

    fn unref(&mut self, slot: usize, dead: &mut Vec<Dead<V>>) {
        let entry = self.entry_mut(slot);
        debug_assert!(entry.refs > 0, "cache handle released twice");
        entry.refs = entry.refs.saturating_sub(1);
        let (refs, in_cache) = (entry.refs, entry.in_cache);

        if refs > 0 {
            return;
        }
        if in_cache {
            // Most recently used end of the LRU list.
            self.unlink(Which::InUse, slot);
            self.push_back(Which::Lru, slot);
        } else {
            dead.push(self.free(slot));
        }
    }

    /// Detach an entry that was just removed from `index`.
    fn finish_erase(&mut self, slot: usize, dead: &mut Vec<Dead<V>>) {
        let (refs, charge) = {
            let entry = self.entry_mut(slot);
            debug_assert!(entry.in_cache);
            entry.in_cache = false;
            (entry.refs, entry.charge)
        };

        let which = if refs == 0 { Which::Lru } else { Which::InUse };
        self.unlink(which, slot);
        self.usage -= charge;

        if refs == 0 {
            dead.push(self.free(slot));
        }
    }

    // -------------------------------------------------------------------------
    // Arena
    // -------------------------------------------------------------------------

    fn alloc(&mut self, entry: Entry<V>) -> usize {
        match self.free_slots.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        }
    }

    fn free(&mut self, slot: usize) -> Dead<V> {
        let entry = self.slots[slot].take().expect("freeing an empty cache slot");
        self.free_slots.push(slot);
        Dead {
            key: entry.key,
            value: entry.value,
            deleter: entry.deleter,
        }
    }

    fn entry(&self, slot: usize) -> &Entry<V> {
        self.slots[slot].as_ref().expect("dangling cache slot")
    }

    fn entry_mut(&mut self, slot: usize) -> &mut Entry<V> {
        self.slots[slot].as_mut().expect("dangling cache slot")
    }

    // -------------------------------------------------------------------------
    // Intrusive Lists
    // -------------------------------------------------------------------------

    fn list_mut(&mut self, which: Which) -> &mut List {
        match which {
            Which::Lru => &mut self.lru,
            Which::InUse => &mut self.in_use,
        }
    }

    fn push_back(&mut self, which: Which, slot: usize) {
        let tail = self.list_mut(which).tail;
        {
            let entry = self.entry_mut(slot);
            entry.prev = tail;
            entry.next = None;
        }
        match tail {
            Some(tail) => self.entry_mut(tail).next = Some(slot),
            None => self.list_mut(which).head = Some(slot),
        }
        let list = self.list_mut(which);
        list.tail = Some(slot);
        list.len += 1;
    }

    fn unlink(&mut self, which: Which, slot: usize) {
        let (prev, next) = {
            let entry = self.entry_mut(slot);
            (entry.prev.take(), entry.next.take())
        };
        match prev {
            Some(prev) => self.entry_mut(prev).next = next,
            None => self.list_mut(which).head = next,
        }
        match next {
            Some(next) => self.entry_mut(next).prev = prev,
            None => self.list_mut(which).tail = prev,
        }
        self.list_mut(which).len -= 1;
    }
}
