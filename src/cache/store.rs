use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use super::types::{Partition, PartitionKey};

/// Default number of partitions kept in memory before the least recently used
/// one is evicted.
pub const DEFAULT_PARTITION_CAPACITY: usize = 64;

/// Keyed storage for cached partitions.
///
/// There is no multi-key transaction: a patch that touches three partitions
/// issues three independent writes. Implementations must be cheap to call from
/// the event loop since patching is synchronous.
pub trait CacheStore: Send + Sync {
    /// Current partition for `key`, or `None` if it was never loaded or has
    /// been evicted.
    fn read(&self, key: &PartitionKey) -> Option<Partition>;

    /// Replace the partition stored under `key`.
    fn write(&self, key: PartitionKey, partition: Partition);

    /// Drop the partition stored under `key`, if any.
    fn invalidate(&self, key: &PartitionKey);

    /// Keys currently held, in no particular order.
    fn keys(&self) -> Vec<PartitionKey>;
}

/// In-memory [`CacheStore`] bounded by an LRU policy.
///
/// Reads count as uses, so the partitions a view is actively rendering stay
/// resident while stale profile feeds age out.
pub struct MemoryCacheStore {
    partitions: Mutex<LruCache<PartitionKey, Partition>>,
}

impl MemoryCacheStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            partitions: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Lock the map, recovering from poisoning.
    ///
    /// A panic while holding the lock can only interrupt a whole-partition
    /// `put`, which never leaves a partially written value behind.
    fn lock(&self) -> MutexGuard<'_, LruCache<PartitionKey, Partition>> {
        self.partitions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_PARTITION_CAPACITY)
    }
}

impl CacheStore for MemoryCacheStore {
    fn read(&self, key: &PartitionKey) -> Option<Partition> {
        self.lock().get(key).cloned()
    }

    fn write(&self, key: PartitionKey, partition: Partition) {
        if let Some((evicted, _)) = self.lock().push(key, partition) {
            if evicted != key {
                tracing::debug!(partition = %evicted, "Evicted least recently used partition");
            }
        }
    }

    fn invalidate(&self, key: &PartitionKey) {
        self.lock().pop(key);
    }

    fn keys(&self) -> Vec<PartitionKey> {
        self.lock().iter().map(|(key, _)| *key).collect()
    }
}
