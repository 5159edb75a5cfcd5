use std::sync::Arc;
use std::time::Instant;

use crate::aggregator::{Aggregator, OrderedCombiners};
use crate::cache::{ConsumeCounter, Consumers};
use crate::context::Context;
use crate::dependency::{Dependency, ShuffleDependency};
use crate::error::Result;
use crate::partitioner::Partitioner;
use crate::rdd::{read_limit, OpKind, Rdd, RddBase, RddVals};
use crate::serializable_traits::{Data, Key};
use crate::shuffle::ShuffleFetcher;

/// Reduce side of a keyed shuffle: one combiner per key, keys in order of first arrival.
pub struct ShuffledRdd<K: Key, V: Data, C: Data> {
    parent: Arc<dyn Rdd<Item = (K, V)>>,
    aggregator: Arc<Aggregator<V, C>>,
    vals: Arc<RddVals>,
    part: Partitioner,
    shuffle_id: usize,
    consumers: Arc<ConsumeCounter>,
}

impl<K: Key, V: Data, C: Data> Clone for ShuffledRdd<K, V, C> {
    fn clone(&self) -> Self {
        ShuffledRdd {
            parent: self.parent.clone(),
            aggregator: self.aggregator.clone(),
            vals: self.vals.clone(),
            part: self.part.clone(),
            shuffle_id: self.shuffle_id,
            consumers: self.consumers.clone(),
        }
    }
}

impl<K: Key, V: Data, C: Data> ShuffledRdd<K, V, C> {
    pub(crate) fn new(
        parent: Arc<dyn Rdd<Item = (K, V)>>,
        aggregator: Arc<Aggregator<V, C>>,
        part: Partitioner,
        op_kind: OpKind,
    ) -> Self {
        let mut vals = RddVals::new(parent.get_context(), op_kind);
        let shuffle_id = vals.context.new_shuffle_id();

        vals.dependencies
            .push(Dependency::ShuffleDependency(Arc::new(
                ShuffleDependency::new(
                    shuffle_id,
                    parent.clone(),
                    aggregator.clone(),
                    part.clone(),
                ),
            )));
        let vals = Arc::new(vals);
        ShuffledRdd {
            parent,
            aggregator,
            vals,
            part,
            shuffle_id,
            consumers: Arc::new(ConsumeCounter::new()),
        }
    }
}

impl<K: Key, V: Data, C: Data> RddBase for ShuffledRdd<K, V, C> {
    fn get_rdd_id(&self) -> usize {
        self.vals.id
    }

    fn get_context(&self) -> Arc<Context> {
        self.vals.context.clone()
    }

    fn get_dependencies(&self) -> Vec<Dependency> {
        self.vals.dependencies.clone()
    }

    fn get_op_kind(&self) -> OpKind {
        self.vals.op_kind.clone()
    }

    fn partitioner(&self) -> Option<Partitioner> {
        Some(self.part.clone())
    }

    fn number_of_splits(&self) -> usize {
        self.part.get_num_of_partitions()
    }

    // reads are counted against the shuffle output, not forwarded past it
    fn add_consumers(&self, consumers: Consumers) {
        self.consumers.add(consumers);
    }
}

impl<K: Key, V: Data, C: Data> Rdd for ShuffledRdd<K, V, C> {
    type Item = (K, C);
    fn get_rdd_base(&self) -> Arc<dyn RddBase> {
        Arc::new(self.clone()) as Arc<dyn RddBase>
    }

    fn get_rdd(&self) -> Arc<dyn Rdd<Item = Self::Item>> {
        Arc::new(self.clone())
    }

    fn compute(&self, split: usize) -> Result<Box<dyn Iterator<Item = Self::Item>>> {
        log::debug!("compute inside shuffled rdd");
        let start = Instant::now();
        let context = &self.vals.context;
        let aggregator = &self.aggregator;
        let mut combiners: OrderedCombiners<K, C> = OrderedCombiners::new();
        ShuffleFetcher::fetch(
            &context.shuffle_manager,
            self.shuffle_id,
            split,
            read_limit(context, &self.consumers),
            self.vals.id,
            |(k, c): (K, C)| combiners.combine(k, c, |c| c, &aggregator.merge_combiners),
        )?;
        log::debug!(
            "time taken for fetching shuffle #{} split {}: {:.3} s",
            self.shuffle_id,
            split,
            start.elapsed().as_secs_f64()
        );
        Ok(Box::new(combiners.into_vec().into_iter()))
    }
}
