use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::Context;
use crate::dependency::Dependency;
use crate::error::Result;
use crate::partitioner::{index_range, Partitioner};
use crate::rdd::{OpKind, Rdd, RddBase, RddVals};
use crate::serializable_traits::Data;

/// Collection of `size` records where record `i` is `f(i)`. Partition `p` produces the indices
/// of its index range, so the records are placed exactly as a shuffle by index would place them.
pub struct GenerateRdd<T: Data, F>
where
    F: Fn(usize) -> T + Send + Sync + 'static,
{
    vals: Arc<RddVals>,
    size: usize,
    f: Arc<F>,
    _marker_t: PhantomData<T>,
}

impl<T: Data, F> Clone for GenerateRdd<T, F>
where
    F: Fn(usize) -> T + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        GenerateRdd {
            vals: self.vals.clone(),
            size: self.size,
            f: self.f.clone(),
            _marker_t: PhantomData,
        }
    }
}

impl<T: Data, F> GenerateRdd<T, F>
where
    F: Fn(usize) -> T + Send + Sync + 'static,
{
    pub(crate) fn new(context: Arc<Context>, size: usize, f: F) -> Self {
        GenerateRdd {
            vals: Arc::new(RddVals::new(context, OpKind::Generate)),
            size,
            f: Arc::new(f),
            _marker_t: PhantomData,
        }
    }
}

impl<T: Data, F> RddBase for GenerateRdd<T, F>
where
    F: Fn(usize) -> T + Send + Sync + 'static,
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
        Some(Partitioner::index_range(
            self.size,
            self.number_of_splits(),
        ))
    }
}

impl<T: Data, F> Rdd for GenerateRdd<T, F>
where
    F: Fn(usize) -> T + Send + Sync + 'static,
{
    type Item = T;
    fn get_rdd(&self) -> Arc<dyn Rdd<Item = Self::Item>> {
        Arc::new(self.clone())
    }

    fn get_rdd_base(&self) -> Arc<dyn RddBase> {
        Arc::new(self.clone()) as Arc<dyn RddBase>
    }

    fn compute(&self, split: usize) -> Result<Box<dyn Iterator<Item = Self::Item>>> {
        let f = self.f.clone();
        let range = index_range(split, self.size, self.number_of_splits());
        Ok(Box::new(range.map(move |i| f(i))))
    }
}
