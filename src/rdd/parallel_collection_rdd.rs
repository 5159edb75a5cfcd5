//! This module implements parallel collection RDD for dividing the input collection for parallel processing.
use std::sync::Arc;

use crate::cache::ConsumeCounter;
use crate::context::Context;
use crate::dependency::Dependency;
use crate::error::{Error, Result};
use crate::rdd::{read_partition, store_partition, OpKind, Rdd, RddBase, RddVals};
use crate::serializable_traits::Data;

/// A collection of objects which can be sliced into partitions with a partitioning function.
pub trait Chunkable<D>
where
    D: Data,
{
    fn slice_with_set_parts(self, parts: usize) -> Vec<Vec<D>>;
}

impl<D: Data> Chunkable<D> for Vec<D> {
    /// Slice `i` holds the records `[i * len / parts, (i + 1) * len / parts)`.
    fn slice_with_set_parts(self, parts: usize) -> Vec<Vec<D>> {
        let len = self.len();
        let bound = |i: usize| i * len / parts;
        let mut iter = self.into_iter();
        (0..parts)
            .map(|i| iter.by_ref().take(bound(i + 1) - bound(i)).collect())
            .collect()
    }
}

/// Driver-supplied records, distributed once and held as a storage point.
pub struct ParallelCollection<T> {
    vals: Arc<RddVals>,
    consumers: Arc<ConsumeCounter>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Data> Clone for ParallelCollection<T> {
    fn clone(&self) -> Self {
        ParallelCollection {
            vals: self.vals.clone(),
            consumers: self.consumers.clone(),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T: Data> ParallelCollection<T> {
    pub fn new(context: Arc<Context>, data: Vec<T>) -> Self {
        let vals = RddVals::new(context.clone(), OpKind::Parallelize);
        let num_slices = context.num_workers();
        for (split, slice) in data.slice_with_set_parts(num_slices).into_iter().enumerate() {
            store_partition(&context, vals.id, split, slice);
        }
        ParallelCollection {
            vals: Arc::new(vals),
            consumers: Arc::new(ConsumeCounter::new()),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T: Data> RddBase for ParallelCollection<T> {
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

    fn is_storage_point(&self) -> bool {
        true
    }

    fn is_materialized(&self) -> bool {
        true
    }

    fn add_consumers(&self, consumers: crate::cache::Consumers) {
        self.consumers.add(consumers);
    }
}

impl<T: Data> Rdd for ParallelCollection<T> {
    type Item = T;
    fn get_rdd(&self) -> Arc<dyn Rdd<Item = Self::Item>> {
        Arc::new(self.clone())
    }

    fn get_rdd_base(&self) -> Arc<dyn RddBase> {
        Arc::new(self.clone()) as Arc<dyn RddBase>
    }

    fn compute(&self, split: usize) -> Result<Box<dyn Iterator<Item = Self::Item>>> {
        let context = self.get_context();
        read_partition(&context, self.vals.id, split, &self.consumers)?.ok_or(
            Error::UseAfterConsume {
                rdd_id: self.vals.id,
            },
        )
    }
}
