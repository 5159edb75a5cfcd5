use crate::error::{Error, Result};
use crate::serializable_traits::Data;
use crate::shuffle::{ReduceRead, ShuffleManager};

/// Reduce side of a shuffle: gathers the buckets every map partition wrote for one reduce
/// partition.
pub(crate) struct ShuffleFetcher;

impl ShuffleFetcher {
    /// Feeds every `(key, combiner)` pair destined for `reduce_id` to `func`, map partitions in
    /// ascending order.
    ///
    /// The read counts against `limit` (see [`ShuffleManager::open_reduce`]); once the
    /// allowance is used up, `rdd_id` is reported as consumed.
    pub fn fetch<K: Data, C: Data>(
        manager: &ShuffleManager,
        shuffle_id: usize,
        reduce_id: usize,
        limit: Option<usize>,
        rdd_id: usize,
        mut func: impl FnMut((K, C)),
    ) -> Result<()> {
        let (num_maps, last) = match manager.open_reduce(shuffle_id, reduce_id, limit) {
            ReduceRead::Available { num_maps, last } => (num_maps, last),
            ReduceRead::Consumed => return Err(Error::UseAfterConsume { rdd_id }),
            ReduceRead::Missing => {
                return Err(Error::ShuffleOutputMissing {
                    shuffle_id,
                    reduce_id,
                })
            }
        };
        log::debug!(
            "fetching {} buckets of shuffle #{} for reduce split {}",
            num_maps,
            shuffle_id,
            reduce_id
        );
        for map_id in 0..num_maps {
            let bytes = manager
                .take_bucket(shuffle_id, map_id, reduce_id, last)
                .ok_or(Error::ShuffleOutputMissing {
                    shuffle_id,
                    reduce_id,
                })?;
            let set = bincode::deserialize::<Vec<(K, C)>>(&bytes)?;
            set.into_iter().for_each(|kv| func(kv));
        }
        Ok(())
    }
}
