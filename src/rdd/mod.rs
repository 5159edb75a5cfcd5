#![allow(clippy::module_inception)]

use std::sync::Arc;

use crate::cache::ConsumeCounter;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::serializable_traits::Data;

pub mod cached_rdd;
pub use cached_rdd::CachedRdd;
pub mod flatmap_rdd;
pub use flatmap_rdd::FlatMapperRdd;
pub mod generate_rdd;
pub use generate_rdd::GenerateRdd;
pub mod index_rdd;
pub use index_rdd::IndexedRdd;
pub mod join_rdd;
pub use join_rdd::{select_join_strategy, JoinStrategy, JoinedRdd, LocationDetection};
pub mod map_partitions_rdd;
pub use map_partitions_rdd::MapPartitionsRdd;
pub mod mapper_rdd;
pub use mapper_rdd::MapperRdd;
pub mod pair_rdd;
pub use pair_rdd::{MappedValuesRdd, PairRdd};
pub mod parallel_collection_rdd;
pub use parallel_collection_rdd::ParallelCollection;
pub mod rdd;
pub use rdd::*;
pub mod shuffled_rdd;
pub use shuffled_rdd::ShuffledRdd;
pub mod zip_rdd;
pub use zip_rdd::ZippedPartitionsRdd;
pub mod zip_with_index_rdd;
pub use zip_with_index_rdd::ZipWithIndexRdd;

/// Stores one materialized partition of a storage point.
pub(crate) fn store_partition<T: Data>(
    context: &Context,
    rdd_id: usize,
    split: usize,
    data: Vec<T>,
) {
    context.cache.put(rdd_id, split, Arc::new(Arc::new(data)));
}

/// Read allowance of a collection under the current consume setting; `None` never frees.
pub(crate) fn read_limit(context: &Context, consumers: &ConsumeCounter) -> Option<usize> {
    if context.consume_enabled() {
        consumers.limit()
    } else {
        None
    }
}

/// Reads one stored partition, counting the read against the allowance of the storage point
/// while consumption is enabled. `Ok(None)` if the partition was never materialized.
pub(crate) fn read_partition<T: Data>(
    context: &Context,
    rdd_id: usize,
    split: usize,
    consumers: &ConsumeCounter,
) -> Result<Option<Box<dyn Iterator<Item = T>>>> {
    let cached = match context.cache.get(rdd_id, split, read_limit(context, consumers))? {
        Some(cached) => cached,
        None => return Ok(None),
    };
    let data = cached
        .downcast_ref::<Arc<Vec<T>>>()
        .ok_or(Error::DowncastFailure("stored partition"))?
        .clone();
    let len = data.len();
    Ok(Some(Box::new((0..len).map(move |i| data[i].clone()))))
}
