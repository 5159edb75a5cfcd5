use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use dashmap::DashMap;

pub(crate) type CachedPartition = Arc<dyn Any + Send + Sync>;

/// Number of reads a storage point allows per partition before its storage is freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumers {
    Keep(usize),
    Forever,
}

/// Read allowance of one storage point, shared by every handle to it.
#[derive(Debug)]
pub(crate) struct ConsumeCounter {
    allowed: AtomicUsize,
}

impl ConsumeCounter {
    const FOREVER: usize = usize::MAX;

    pub fn new() -> Self {
        ConsumeCounter {
            allowed: AtomicUsize::new(1),
        }
    }

    pub fn add(&self, consumers: Consumers) {
        match consumers {
            Consumers::Keep(n) => {
                let mut current = self.allowed.load(Ordering::SeqCst);
                loop {
                    let next = current.saturating_add(n);
                    match self.allowed.compare_exchange(
                        current,
                        next,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    ) {
                        Ok(_) => break,
                        Err(actual) => current = actual,
                    }
                }
            }
            Consumers::Forever => self.allowed.store(Self::FOREVER, Ordering::SeqCst),
        }
    }

    /// `None` when reads never free the storage.
    pub fn limit(&self) -> Option<usize> {
        match self.allowed.load(Ordering::SeqCst) {
            Self::FOREVER => None,
            n => Some(n),
        }
    }
}

enum CacheSlot {
    Stored { data: CachedPartition, reads: usize },
    Freed,
}

// In-memory store of materialized partitions, keyed by (rdd id, partition).
pub(crate) struct MemoryCache {
    map: DashMap<(usize, usize), CacheSlot>,
    freed_partitions: AtomicUsize,
}

impl MemoryCache {
    pub fn new() -> Self {
        MemoryCache {
            map: DashMap::new(),
            freed_partitions: AtomicUsize::new(0),
        }
    }

    pub fn put(&self, rdd_id: usize, partition: usize, data: CachedPartition) {
        self.map
            .insert((rdd_id, partition), CacheSlot::Stored { data, reads: 0 });
    }

    /// Whether the partition was materialized, even if its storage has been freed since.
    pub fn contains(&self, rdd_id: usize, partition: usize) -> bool {
        self.map.contains_key(&(rdd_id, partition))
    }

    /// Reads a partition, counting the read against `limit` when one is given. The read that
    /// exhausts the limit frees the storage; any later read fails.
    pub fn get(
        &self,
        rdd_id: usize,
        partition: usize,
        limit: Option<usize>,
    ) -> Result<Option<CachedPartition>> {
        let mut slot = match self.map.get_mut(&(rdd_id, partition)) {
            Some(slot) => slot,
            None => return Ok(None),
        };
        let (data, exhausted) = match &mut *slot {
            CacheSlot::Freed => return Err(Error::UseAfterConsume { rdd_id }),
            CacheSlot::Stored { data, reads } => {
                *reads += 1;
                let exhausted = limit.map_or(false, |limit| *reads >= limit);
                (data.clone(), exhausted)
            }
        };
        if exhausted {
            log::debug!("freeing partition {} of #{}", partition, rdd_id);
            *slot = CacheSlot::Freed;
            self.freed_partitions.fetch_add(1, Ordering::SeqCst);
        }
        Ok(Some(data))
    }

    pub fn freed_partitions(&self) -> usize {
        self.freed_partitions.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partition(values: Vec<u32>) -> CachedPartition {
        Arc::new(Arc::new(values))
    }

    #[test]
    fn unlimited_reads_never_free() {
        let cache = MemoryCache::new();
        cache.put(1, 0, partition(vec![1, 2, 3]));
        for _ in 0..5 {
            assert!(cache.get(1, 0, None).unwrap().is_some());
        }
        assert_eq!(cache.freed_partitions(), 0);
    }

    #[test]
    fn last_allowed_read_frees_partition() {
        let cache = MemoryCache::new();
        cache.put(7, 2, partition(vec![4]));
        let data = cache.get(7, 2, Some(2)).unwrap().unwrap();
        assert_eq!(*data.downcast::<Arc<Vec<u32>>>().unwrap(), Arc::new(vec![4]));
        assert!(cache.get(7, 2, Some(2)).unwrap().is_some());
        match cache.get(7, 2, Some(2)) {
            Err(Error::UseAfterConsume { rdd_id }) => assert_eq!(rdd_id, 7),
            _ => panic!("expected UseAfterConsume"),
        }
        assert!(cache.contains(7, 2));
        assert_eq!(cache.freed_partitions(), 1);
    }

    #[test]
    fn missing_partition_is_not_an_error() {
        let cache = MemoryCache::new();
        assert!(cache.get(3, 0, Some(1)).unwrap().is_none());
        assert!(!cache.contains(3, 0));
    }

    #[test]
    fn keep_adds_reads() {
        let counter = ConsumeCounter::new();
        assert_eq!(counter.limit(), Some(1));
        counter.add(Consumers::Keep(2));
        assert_eq!(counter.limit(), Some(3));
        counter.add(Consumers::Forever);
        assert_eq!(counter.limit(), None);
        counter.add(Consumers::Keep(1));
        assert_eq!(counter.limit(), None);
    }
}
