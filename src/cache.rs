//! Generic value-keyed object cache.
//!
//! [`ValueKeyedCache`] maps a structurally comparable description to a shared,
//! reference-counted instance, guaranteeing at most one live instance per
//! distinct key value, even under concurrent access. It is the mechanism
//! behind [`PipelineStateCache`] and [`SamplerStateCache`].
//!
//! Keys are hashed exactly once per operation and entries are grouped by that
//! hash, so the potentially expensive structural content (e.g. input element
//! arrays) is never re-hashed during bucket scans.
//!
//! [`PipelineStateCache`]: crate::state_cache::PipelineStateCache
//! [`SamplerStateCache`]: crate::state_cache::SamplerStateCache

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::GraphicsError;

fn hash_key<K: Hash>(key: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// One interned entry: the cloned key, the shared instance, and its count.
struct Slot<K, V> {
    key: K,
    value: Arc<V>,
    ref_count: usize,
}

/// A content-addressed cache mapping key values to shared instances.
///
/// Lookup is by structural equality, not identity: two different key objects
/// that compare equal resolve to the same cached instance. The construction
/// lock is held across lookup, factory invocation, and insertion, so two
/// concurrent callers with equal keys can never race to construct duplicate
/// instances. Construction is expected to be rare relative to lookups;
/// blocking briefly on a miss is deliberately preferred over duplicating an
/// expensive native object.
///
/// Keys are cloned on insertion, so mutating the caller's key object after a
/// call can never corrupt an interned entry.
pub struct ValueKeyedCache<K, V> {
    buckets: Mutex<HashMap<u64, Vec<Slot<K, V>>>>,
}

impl<K: Hash + Eq + Clone, V> ValueKeyedCache<K, V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Look up `key`, constructing and interning a new instance on a miss.
    ///
    /// On a hit the entry's reference count is incremented and the existing
    /// instance returned. On a miss `factory` runs under the cache lock and
    /// its result is interned with a reference count of one.
    ///
    /// # Errors
    ///
    /// A factory error propagates to the caller and leaves the cache
    /// unmodified; nothing is interned for a failed construction.
    pub fn get_or_create<F>(&self, key: &K, factory: F) -> Result<Arc<V>, GraphicsError>
    where
        F: FnOnce(&K) -> Result<V, GraphicsError>,
    {
        let hash = hash_key(key);
        let mut buckets = self.buckets.lock();

        if let Some(bucket) = buckets.get_mut(&hash) {
            if let Some(slot) = bucket.iter_mut().find(|slot| slot.key == *key) {
                slot.ref_count += 1;
                return Ok(Arc::clone(&slot.value));
            }
        }

        // Still holding the lock: a concurrent caller with an equal key must
        // block here rather than construct a second instance.
        let value = Arc::new(factory(key)?);
        buckets.entry(hash).or_default().push(Slot {
            key: key.clone(),
            value: Arc::clone(&value),
            ref_count: 1,
        });
        Ok(value)
    }

    /// Release one reference to the entry for `key`.
    ///
    /// When the reference count reaches zero the entry is erased and the
    /// shared instance dropped. Returns `true` if the entry was erased,
    /// `false` if references remain or no entry exists for `key`.
    pub fn release(&self, key: &K) -> bool {
        let hash = hash_key(key);
        let mut buckets = self.buckets.lock();
        let Some(bucket) = buckets.get_mut(&hash) else {
            return false;
        };
        let Some(index) = bucket.iter().position(|slot| slot.key == *key) else {
            return false;
        };

        bucket[index].ref_count -= 1;
        if bucket[index].ref_count > 0 {
            return false;
        }

        bucket.swap_remove(index);
        if bucket.is_empty() {
            buckets.remove(&hash);
        }
        true
    }

    /// Drop every entry in one pass (device teardown).
    pub fn clear(&self) {
        self.buckets.lock().clear();
    }

    /// Number of interned entries.
    pub fn len(&self) -> usize {
        self.buckets.lock().values().map(Vec::len).sum()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.buckets.lock().is_empty()
    }

    /// Whether an entry exists for `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.ref_count(key).is_some()
    }

    /// Reference count of the entry for `key`, if interned.
    pub fn ref_count(&self, key: &K) -> Option<usize> {
        let hash = hash_key(key);
        let buckets = self.buckets.lock();
        buckets
            .get(&hash)?
            .iter()
            .find(|slot| slot.key == *key)
            .map(|slot| slot.ref_count)
    }
}

impl<K: Hash + Eq + Clone, V> Default for ValueKeyedCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for ValueKeyedCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueKeyedCache")
            .field("entries", &self.buckets.lock().values().map(Vec::len).sum::<usize>())
            .finish()
    }
}
