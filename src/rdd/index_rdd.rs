use std::sync::Arc;

use crate::aggregator::Aggregator;
use crate::cache::{ConsumeCounter, Consumers};
use crate::context::Context;
use crate::dependency::{Dependency, ShuffleDependency};
use crate::error::Result;
use crate::partitioner::{index_range, Partitioner};
use crate::rdd::{read_limit, OpKind, Rdd, RddBase, RddVals};
use crate::serializable_traits::Data;
use crate::shuffle::ShuffleFetcher;

type Finisher<C, U> = Arc<dyn Fn(usize, Option<C>) -> U + Send + Sync>;

/// Dense result of a shuffle by index: partition `p` yields one record for every index of
/// its index range, in ascending order, whether or not any input carried that index.
pub struct IndexedRdd<T: Data, C: Data, U: Data> {
    vals: Arc<RddVals>,
    aggregator: Arc<Aggregator<T, C>>,
    universe: usize,
    finish: Finisher<C, U>,
    part: Partitioner,
    shuffle_id: usize,
    consumers: Arc<ConsumeCounter>,
}

impl<T: Data, C: Data, U: Data> Clone for IndexedRdd<T, C, U> {
    fn clone(&self) -> Self {
        IndexedRdd {
            vals: self.vals.clone(),
            aggregator: self.aggregator.clone(),
            universe: self.universe,
            finish: self.finish.clone(),
            part: self.part.clone(),
            shuffle_id: self.shuffle_id,
            consumers: self.consumers.clone(),
        }
    }
}

impl<T: Data, C: Data, U: Data> IndexedRdd<T, C, U> {
    /// `finish` turns the combined records of one index into the output record; it gets
    /// `None` for an index no input record carried.
    pub(crate) fn new<FF>(
        parent: Arc<dyn Rdd<Item = (usize, T)>>,
        aggregator: Arc<Aggregator<T, C>>,
        universe: usize,
        finish: FF,
        op_kind: OpKind,
    ) -> Self
    where
        FF: Fn(usize, Option<C>) -> U + Send + Sync + 'static,
    {
        let mut vals = RddVals::new(parent.get_context(), op_kind);
        let shuffle_id = vals.context.new_shuffle_id();
        let part = Partitioner::index_range(universe, vals.context.num_workers());
        vals.dependencies
            .push(Dependency::ShuffleDependency(Arc::new(
                ShuffleDependency::new(shuffle_id, parent, aggregator.clone(), part.clone()),
            )));
        IndexedRdd {
            vals: Arc::new(vals),
            aggregator,
            universe,
            finish: Arc::new(finish),
            part,
            shuffle_id,
            consumers: Arc::new(ConsumeCounter::new()),
        }
    }
}

impl<T: Data, C: Data, U: Data> RddBase for IndexedRdd<T, C, U> {
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

impl<T: Data, C: Data, U: Data> Rdd for IndexedRdd<T, C, U> {
    type Item = U;
    fn get_rdd(&self) -> Arc<dyn Rdd<Item = Self::Item>> {
        Arc::new(self.clone())
    }

    fn get_rdd_base(&self) -> Arc<dyn RddBase> {
        Arc::new(self.clone()) as Arc<dyn RddBase>
    }

    fn compute(&self, split: usize) -> Result<Box<dyn Iterator<Item = Self::Item>>> {
        let context = &self.vals.context;
        let range = index_range(split, self.universe, self.number_of_splits());
        let start = range.start;
        let merge = &self.aggregator.merge_combiners;
        let mut slots: Vec<Option<C>> = range.map(|_| None).collect();
        ShuffleFetcher::fetch(
            &context.shuffle_manager,
            self.shuffle_id,
            split,
            read_limit(context, &self.consumers),
            self.vals.id,
            |(index, c): (usize, C)| {
                // the index partitioner only routes indices of this range here
                let slot = &mut slots[index - start];
                *slot = Some(match slot.take() {
                    Some(old) => merge(old, c),
                    None => c,
                });
            },
        )?;
        let finish = self.finish.clone();
        Ok(Box::new(
            slots
                .into_iter()
                .enumerate()
                .map(move |(i, c)| finish(start + i, c)),
        ))
    }
}
