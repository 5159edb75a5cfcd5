use std::sync::Arc;

use crate::cache::{ConsumeCounter, Consumers};
use crate::context::Context;
use crate::dependency::{Dependency, OneToOneDependency};
use crate::error::{Error, Result};
use crate::partitioner::Partitioner;
use crate::rdd::{read_partition, store_partition, OpKind, Rdd, RddBase, RddVals};
use crate::serializable_traits::Data;

/// Storage point: the records of the parent are computed once, in a barrier stage, and every
/// later read is served from memory until the read allowance is used up.
pub struct CachedRdd<T: Data> {
    prev: Arc<dyn Rdd<Item = T>>,
    vals: Arc<RddVals>,
    consumers: Arc<ConsumeCounter>,
}

impl<T: Data> Clone for CachedRdd<T> {
    fn clone(&self) -> Self {
        CachedRdd {
            prev: self.prev.clone(),
            vals: self.vals.clone(),
            consumers: self.consumers.clone(),
        }
    }
}

impl<T: Data> CachedRdd<T> {
    pub(crate) fn new(prev: Arc<dyn Rdd<Item = T>>) -> Self {
        let mut vals = RddVals::new(prev.get_context(), OpKind::Cache);
        vals.dependencies
            .push(Dependency::NarrowDependency(Arc::new(
                OneToOneDependency::new(prev.get_rdd_base()),
            )));
        CachedRdd {
            prev,
            vals: Arc::new(vals),
            consumers: Arc::new(ConsumeCounter::new()),
        }
    }

    fn store(&self, split: usize) -> Result<usize> {
        let data = self.prev.iterator(split)?.collect::<Vec<_>>();
        let len = data.len();
        store_partition(&self.vals.context, self.vals.id, split, data);
        Ok(len)
    }
}

impl<T: Data> RddBase for CachedRdd<T> {
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
        self.prev.partitioner()
    }

    fn number_of_splits(&self) -> usize {
        self.prev.number_of_splits()
    }

    fn is_storage_point(&self) -> bool {
        true
    }

    fn is_materialized(&self) -> bool {
        let cache = &self.vals.context.cache;
        (0..self.number_of_splits()).all(|split| cache.contains(self.vals.id, split))
    }

    fn needs_barrier_stage(&self) -> bool {
        !self.is_materialized()
    }

    fn run_barrier_task(&self, split: usize) -> Result<usize> {
        if self.vals.context.cache.contains(self.vals.id, split) {
            return Ok(0);
        }
        self.store(split)
    }

    fn complete_barrier(&self, counts: Vec<usize>) -> Result<()> {
        log::debug!(
            "cached collection #{} with {} records",
            self.vals.id,
            counts.iter().sum::<usize>()
        );
        Ok(())
    }

    fn add_consumers(&self, consumers: Consumers) {
        self.consumers.add(consumers);
    }
}

impl<T: Data> Rdd for CachedRdd<T> {
    type Item = T;
    fn get_rdd(&self) -> Arc<dyn Rdd<Item = Self::Item>> {
        Arc::new(self.clone())
    }

    fn get_rdd_base(&self) -> Arc<dyn RddBase> {
        Arc::new(self.clone()) as Arc<dyn RddBase>
    }

    fn compute(&self, split: usize) -> Result<Box<dyn Iterator<Item = Self::Item>>> {
        let context = &self.vals.context;
        if let Some(iter) = read_partition(context, self.vals.id, split, &self.consumers)? {
            return Ok(iter);
        }
        self.store(split)?;
        read_partition(context, self.vals.id, split, &self.consumers)?.ok_or(
            Error::UseAfterConsume {
                rdd_id: self.vals.id,
            },
        )
    }
}
