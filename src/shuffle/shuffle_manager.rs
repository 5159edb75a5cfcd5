use std::sync::atomic::{AtomicU64, Ordering};

use crate::shuffle::Traffic;
use dashmap::DashMap;

struct MapOutputs {
    num_maps: usize,
    reads: Vec<usize>,
    freed: Vec<bool>,
}

/// Outcome of opening one reduce partition of a shuffle for reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReduceRead {
    /// The buckets are there; `last` is set when this read uses up the allowance.
    Available { num_maps: usize, last: bool },
    /// Every allowed read has happened and the buckets are gone.
    Consumed,
    /// The map stage has not run.
    Missing,
}

/// Holds the serialized buckets written by shuffle map tasks until the reduce side fetches them.
///
/// Buckets are keyed by (shuffle id, map partition, reduce partition). A shuffle is available once
/// its whole map stage has completed. Reads of a reduce partition are counted against the limit
/// the reading collection passes in; the read that reaches it frees that partition's buckets, and
/// the shuffle stays registered so later reads report the consumption.
pub(crate) struct ShuffleManager {
    buckets: DashMap<(usize, usize, usize), Vec<u8>>,
    map_outputs: DashMap<usize, MapOutputs>,
    local_bytes: AtomicU64,
    remote_bytes: AtomicU64,
    bucket_count: AtomicU64,
}

impl ShuffleManager {
    pub fn new() -> Self {
        ShuffleManager {
            buckets: DashMap::new(),
            map_outputs: DashMap::new(),
            local_bytes: AtomicU64::new(0),
            remote_bytes: AtomicU64::new(0),
            bucket_count: AtomicU64::new(0),
        }
    }

    pub fn put_bucket(&self, shuffle_id: usize, map_id: usize, reduce_id: usize, bytes: Vec<u8>) {
        let counter = if map_id == reduce_id {
            &self.local_bytes
        } else {
            &self.remote_bytes
        };
        counter.fetch_add(bytes.len() as u64, Ordering::SeqCst);
        self.bucket_count.fetch_add(1, Ordering::SeqCst);
        self.buckets.insert((shuffle_id, map_id, reduce_id), bytes);
    }

    pub fn register_map_outputs(&self, shuffle_id: usize, num_maps: usize, num_reduces: usize) {
        log::debug!(
            "registering {} map outputs for shuffle #{}",
            num_maps,
            shuffle_id
        );
        self.map_outputs.insert(
            shuffle_id,
            MapOutputs {
                num_maps,
                reads: vec![0; num_reduces],
                freed: vec![false; num_reduces],
            },
        );
    }

    pub fn is_available(&self, shuffle_id: usize) -> bool {
        self.map_outputs.contains_key(&shuffle_id)
    }

    /// Counts one read of `reduce_id` against `limit`; `None` never frees the buckets.
    pub fn open_reduce(
        &self,
        shuffle_id: usize,
        reduce_id: usize,
        limit: Option<usize>,
    ) -> ReduceRead {
        let mut outputs = match self.map_outputs.get_mut(&shuffle_id) {
            Some(outputs) => outputs,
            None => return ReduceRead::Missing,
        };
        match outputs.freed.get(reduce_id) {
            None => return ReduceRead::Missing,
            Some(true) => return ReduceRead::Consumed,
            Some(false) => {}
        }
        outputs.reads[reduce_id] += 1;
        let last = limit.map_or(false, |limit| outputs.reads[reduce_id] >= limit);
        if last {
            log::debug!(
                "reduce split {} of shuffle #{} consumed after {} reads",
                reduce_id,
                shuffle_id,
                outputs.reads[reduce_id]
            );
            outputs.freed[reduce_id] = true;
        }
        ReduceRead::Available {
            num_maps: outputs.num_maps,
            last,
        }
    }

    /// The bucket written by `map_id` for `reduce_id`; `remove` frees it.
    pub fn take_bucket(
        &self,
        shuffle_id: usize,
        map_id: usize,
        reduce_id: usize,
        remove: bool,
    ) -> Option<Vec<u8>> {
        let key = (shuffle_id, map_id, reduce_id);
        if remove {
            self.buckets.remove(&key).map(|(_, bytes)| bytes)
        } else {
            self.buckets.get(&key).map(|bytes| bytes.clone())
        }
    }

    pub fn traffic(&self) -> Traffic {
        Traffic {
            local_bytes: self.local_bytes.load(Ordering::SeqCst),
            remote_bytes: self.remote_bytes.load(Ordering::SeqCst),
            buckets: self.bucket_count.load(Ordering::SeqCst),
        }
    }
}
