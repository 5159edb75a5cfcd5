use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::Context;
use crate::dependency::{Dependency, OneToOneDependency};
use crate::error::Result;
use crate::partitioner::Partitioner;
use crate::rdd::{OpKind, Rdd, RddBase, RddVals};
use crate::serializable_traits::Data;

/// An RDD that applies the provided function to every partition of the parent RDD.
pub struct MapPartitionsRdd<T: Data, U: Data, F>
where
    F: Fn(usize, Box<dyn Iterator<Item = T>>) -> Result<Box<dyn Iterator<Item = U>>>
        + Send
        + Sync
        + 'static,
{
    prev: Arc<dyn Rdd<Item = T>>,
    vals: Arc<RddVals>,
    f: Arc<F>,
    preserves_partitioning: bool,
    _marker_t: PhantomData<T>,
}

impl<T: Data, U: Data, F> Clone for MapPartitionsRdd<T, U, F>
where
    F: Fn(usize, Box<dyn Iterator<Item = T>>) -> Result<Box<dyn Iterator<Item = U>>>
        + Send
        + Sync
        + 'static,
{
    fn clone(&self) -> Self {
        MapPartitionsRdd {
            prev: self.prev.clone(),
            vals: self.vals.clone(),
            f: self.f.clone(),
            preserves_partitioning: self.preserves_partitioning,
            _marker_t: PhantomData,
        }
    }
}

impl<T: Data, U: Data, F> MapPartitionsRdd<T, U, F>
where
    F: Fn(usize, Box<dyn Iterator<Item = T>>) -> Result<Box<dyn Iterator<Item = U>>>
        + Send
        + Sync
        + 'static,
{
    /// With `preserves_partitioning` the node reports the partitioner of its parent; only set
    /// it when `f` leaves the placement of every record valid.
    pub(crate) fn new(
        prev: Arc<dyn Rdd<Item = T>>,
        f: F,
        op_kind: OpKind,
        preserves_partitioning: bool,
    ) -> Self {
        let mut vals = RddVals::new(prev.get_context(), op_kind);
        vals.dependencies
            .push(Dependency::NarrowDependency(Arc::new(
                OneToOneDependency::new(prev.get_rdd_base()),
            )));
        let vals = Arc::new(vals);
        MapPartitionsRdd {
            prev,
            vals,
            f: Arc::new(f),
            preserves_partitioning,
            _marker_t: PhantomData,
        }
    }
}

impl<T: Data, U: Data, F> RddBase for MapPartitionsRdd<T, U, F>
where
    F: Fn(usize, Box<dyn Iterator<Item = T>>) -> Result<Box<dyn Iterator<Item = U>>>
        + Send
        + Sync
        + 'static,
{
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
        if self.preserves_partitioning {
            self.prev.partitioner()
        } else {
            None
        }
    }

    fn number_of_splits(&self) -> usize {
        self.prev.number_of_splits()
    }
}

impl<T: Data, U: Data, F> Rdd for MapPartitionsRdd<T, U, F>
where
    F: Fn(usize, Box<dyn Iterator<Item = T>>) -> Result<Box<dyn Iterator<Item = U>>>
        + Send
        + Sync
        + 'static,
{
    type Item = U;
    fn get_rdd_base(&self) -> Arc<dyn RddBase> {
        Arc::new(self.clone()) as Arc<dyn RddBase>
    }

    fn get_rdd(&self) -> Arc<dyn Rdd<Item = Self::Item>> {
        Arc::new(self.clone())
    }

    fn compute(&self, split: usize) -> Result<Box<dyn Iterator<Item = Self::Item>>> {
        let f = self.f.clone();
        f(split, self.prev.iterator(split)?)
    }
}
