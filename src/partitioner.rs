use std::any::{Any, TypeId};
use std::hash::{Hash, Hasher};
use std::ops::Range;

use crate::error::{Error, Result};
use crate::serializable_traits::Key;
use rustc_hash::FxHasher;

/// Partitioning provenance of a collection: where a record with a given key lives.
///
/// Operators that route records by key attach one of these to their output. Two collections
/// carrying equal partitioners hold every key on the same partition, which is what the join
/// uses to skip the shuffle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Partitioner {
    /// Record for index `i` of the dense universe `[0, universe)` lives in the partition owning
    /// the contiguous range around `i`.
    IndexRange { universe: usize, partitions: usize },
    /// Record with key `k` lives in partition `hash(k) % partitions`.
    Hash {
        partitions: usize,
        key_type: TypeId,
        key_type_name: &'static str,
    },
}

fn hash<T: Hash>(t: &T) -> u64 {
    let mut s = FxHasher::default();
    t.hash(&mut s);
    s.finish()
}

impl Partitioner {
    pub fn index_range(universe: usize, partitions: usize) -> Self {
        Partitioner::IndexRange {
            universe,
            partitions,
        }
    }

    pub fn hash<K: Key>(partitions: usize) -> Self {
        Partitioner::Hash {
            partitions,
            key_type: TypeId::of::<K>(),
            key_type_name: std::any::type_name::<K>(),
        }
    }

    pub fn get_num_of_partitions(&self) -> usize {
        match self {
            Partitioner::IndexRange { partitions, .. } => *partitions,
            Partitioner::Hash { partitions, .. } => *partitions,
        }
    }

    /// Whether keys of type `K` can be routed by this partitioner.
    pub fn accepts_key<K: Key>(&self) -> bool {
        match self {
            Partitioner::IndexRange { .. } => TypeId::of::<K>() == TypeId::of::<usize>(),
            Partitioner::Hash { key_type, .. } => *key_type == TypeId::of::<K>(),
        }
    }

    pub fn get_partition<K: Key>(&self, key: &K) -> Result<usize> {
        match self {
            Partitioner::IndexRange {
                universe,
                partitions,
            } => {
                let index = (key as &dyn Any)
                    .downcast_ref::<usize>()
                    .ok_or(Error::DowncastFailure("usize index key"))?;
                index_partition(*index, *universe, *partitions)
            }
            Partitioner::Hash { partitions, .. } => Ok(hash(key) as usize % partitions),
        }
    }

    /// Like [`get_partition`](Self::get_partition), but total: an index outside the universe
    /// is hashed instead of rejected. Joins route both inputs this way, so equal keys meet on
    /// the same partition even when no index range owns them.
    pub fn route<K: Key>(&self, key: &K) -> Result<usize> {
        match self.get_partition(key) {
            Err(Error::KeyRange { .. }) => Ok(hash(key) as usize % self.get_num_of_partitions()),
            owner => owner,
        }
    }
}

/// Partition owning `index`, the inverse of [`index_range`].
pub fn index_partition(index: usize, universe: usize, partitions: usize) -> Result<usize> {
    if index >= universe {
        return Err(Error::KeyRange {
            key: index,
            universe,
        });
    }
    let p = ((index as u128 + 1) * partitions as u128 - 1) / universe as u128;
    Ok((p as usize).min(partitions - 1))
}

/// Contiguous index range `[p * universe / partitions, (p + 1) * universe / partitions)` held by
/// partition `p`.
pub fn index_range(partition: usize, universe: usize, partitions: usize) -> Range<usize> {
    let bound = |p: usize| (p as u128 * universe as u128 / partitions as u128) as usize;
    bound(partition)..bound(partition + 1)
}
