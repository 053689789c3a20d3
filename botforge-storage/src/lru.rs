//! Bounded LRU cache for credential resolution.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Mutex;

/// Default capacity for credential-to-tenant resolution.
pub const DEFAULT_LRU_CAPACITY: usize = 3000;

struct LruInner<K, V> {
    /// Key to `(value, recency sequence)`.
    entries: HashMap<K, (V, u64)>,
    /// Recency sequence to key, oldest first.
    order: BTreeMap<u64, K>,
    next_seq: u64,
    capacity: usize,
}

/// Thread-safe bounded LRU map.
///
/// Both lookup and insertion count as use. Touch and eviction happen under
/// one lock acquisition, so the size bound holds under concurrent access.
/// Entries have no TTL; staleness is bounded only by eviction.
pub struct LruCache<K, V> {
    inner: Mutex<LruInner<K, V>>,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries. A zero capacity is
    /// promoted to 1 so insertion always succeeds.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruInner {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                next_seq: 0,
                capacity: capacity.max(1),
            }),
        }
    }

    /// Look up `key`, marking it most recently used on a hit.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let seq = inner.next_seq;
        let (value, old_seq) = match inner.entries.get_mut(key) {
            Some((value, entry_seq)) => {
                let old = *entry_seq;
                *entry_seq = seq;
                (value.clone(), old)
            }
            None => return None,
        };
        inner.next_seq += 1;
        inner.order.remove(&old_seq);
        inner.order.insert(seq, key.clone());
        Some(value)
    }

    /// Insert or overwrite `key`, marking it most recently used and evicting
    /// the least recently used entry if the cache is over capacity.
    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let seq = inner.next_seq;
        inner.next_seq += 1;

        if let Some((_, old_seq)) = inner.entries.remove(&key) {
            inner.order.remove(&old_seq);
        }
        inner.entries.insert(key.clone(), (value, seq));
        inner.order.insert(seq, key);

        if inner.entries.len() > inner.capacity {
            if let Some((&oldest_seq, _)) = inner.order.iter().next() {
                if let Some(oldest_key) = inner.order.remove(&oldest_seq) {
                    inner.entries.remove(&oldest_key);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_LRU_CAPACITY)
    }
}
