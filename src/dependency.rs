use std::cmp::Ordering;
use std::sync::Arc;

use crate::aggregator::{Aggregator, OrderedCombiners};
use crate::error::Result;
use crate::partitioner::Partitioner;
use crate::rdd::{Rdd, RddBase};
use crate::serializable_traits::{Data, Key};

// Enum rather than a single trait object since narrow and shuffle edges are walked differently
// by the scheduler.
#[derive(Clone)]
pub enum Dependency {
    NarrowDependency(Arc<dyn NarrowDependencyTrait>),
    ShuffleDependency(Arc<dyn ShuffleDependencyTrait>),
}

pub trait NarrowDependencyTrait: Send + Sync {
    fn get_parents(&self, partition_id: usize) -> Vec<usize>;
    fn get_rdd_base(&self) -> Arc<dyn RddBase>;
}

#[derive(Clone)]
pub(crate) struct OneToOneDependency {
    rdd_base: Arc<dyn RddBase>,
}

impl OneToOneDependency {
    pub fn new(rdd_base: Arc<dyn RddBase>) -> Self {
        OneToOneDependency { rdd_base }
    }
}

impl NarrowDependencyTrait for OneToOneDependency {
    fn get_parents(&self, partition_id: usize) -> Vec<usize> {
        vec![partition_id]
    }

    fn get_rdd_base(&self) -> Arc<dyn RddBase> {
        self.rdd_base.clone()
    }
}

pub trait ShuffleDependencyTrait: Send + Sync {
    fn get_shuffle_id(&self) -> usize;
    fn get_rdd_base(&self) -> Arc<dyn RddBase>;
    fn get_partitioner(&self) -> &Partitioner;
    /// Runs the map side for one partition of the parent: combines its records per key, splits
    /// them into one bucket per reduce partition and hands the encoded buckets to the shuffle
    /// manager. Returns the number of input records.
    fn do_shuffle_task(&self, partition: usize) -> Result<usize>;
}

impl PartialOrd for dyn ShuffleDependencyTrait {
    fn partial_cmp(&self, other: &dyn ShuffleDependencyTrait) -> Option<Ordering> {
        Some(self.get_shuffle_id().cmp(&other.get_shuffle_id()))
    }
}

impl PartialEq for dyn ShuffleDependencyTrait {
    fn eq(&self, other: &dyn ShuffleDependencyTrait) -> bool {
        self.get_shuffle_id() == other.get_shuffle_id()
    }
}

impl Eq for dyn ShuffleDependencyTrait {}

impl Ord for dyn ShuffleDependencyTrait {
    fn cmp(&self, other: &dyn ShuffleDependencyTrait) -> Ordering {
        self.get_shuffle_id().cmp(&other.get_shuffle_id())
    }
}

pub(crate) struct ShuffleDependency<K: Key, V: Data, C: Data> {
    pub shuffle_id: usize,
    pub parent: Arc<dyn Rdd<Item = (K, V)>>,
    pub aggregator: Arc<Aggregator<V, C>>,
    pub partitioner: Partitioner,
    // hash keys the partitioner has no owner for instead of failing
    pub route_all_keys: bool,
}

impl<K: Key, V: Data, C: Data> ShuffleDependency<K, V, C> {
    pub fn new(
        shuffle_id: usize,
        parent: Arc<dyn Rdd<Item = (K, V)>>,
        aggregator: Arc<Aggregator<V, C>>,
        partitioner: Partitioner,
    ) -> Self {
        ShuffleDependency {
            shuffle_id,
            parent,
            aggregator,
            partitioner,
            route_all_keys: false,
        }
    }

    /// Routes every key with [`Partitioner::route`], as joins do.
    pub fn routing_all_keys(mut self) -> Self {
        self.route_all_keys = true;
        self
    }
}

impl<K: Key, V: Data, C: Data> ShuffleDependencyTrait for ShuffleDependency<K, V, C> {
    fn get_shuffle_id(&self) -> usize {
        self.shuffle_id
    }

    fn get_rdd_base(&self) -> Arc<dyn RddBase> {
        self.parent.get_rdd_base()
    }

    fn get_partitioner(&self) -> &Partitioner {
        &self.partitioner
    }

    fn do_shuffle_task(&self, partition: usize) -> Result<usize> {
        log::debug!(
            "executing shuffle task #{} for partition #{}",
            self.shuffle_id,
            partition
        );
        let aggregator = &self.aggregator;
        let num_output_splits = self.partitioner.get_num_of_partitions();
        let mut buckets: Vec<OrderedCombiners<K, C>> = (0..num_output_splits)
            .map(|_| OrderedCombiners::new())
            .collect::<Vec<_>>();

        let mut records = 0;
        for (k, v) in self.parent.iterator(partition)? {
            records += 1;
            let bucket_id = if self.route_all_keys {
                self.partitioner.route(&k)?
            } else {
                self.partitioner.get_partition(&k)?
            };
            buckets[bucket_id].combine(
                k,
                v,
                &aggregator.create_combiner,
                &aggregator.merge_value,
            );
        }

        let context = self.parent.get_context();
        let manager = &context.shuffle_manager;
        for (reduce_id, bucket) in buckets.into_iter().enumerate() {
            let bytes = bincode::serialize(&bucket.into_vec())?;
            manager.put_bucket(self.shuffle_id, partition, reduce_id, bytes);
        }
        log::debug!(
            "shuffle task #{} for partition #{} wrote {} records",
            self.shuffle_id,
            partition,
            records
        );
        Ok(records)
    }
}
