use std::sync::Arc;

use crate::context::Context;
use crate::dependency::{Dependency, OneToOneDependency};
use crate::error::{Error, Result};
use crate::rdd::{OpKind, Rdd, RddBase, RddVals};
use crate::serializable_traits::Data;

/// Positional pairing of two collections, partition by partition. Both sides of a partition
/// must hold the same number of records.
pub struct ZippedPartitionsRdd<T: Data, S: Data, U: Data, F>
where
    F: Fn(T, S) -> U + Send + Sync + 'static,
{
    first: Arc<dyn Rdd<Item = T>>,
    second: Arc<dyn Rdd<Item = S>>,
    vals: Arc<RddVals>,
    f: Arc<F>,
}

impl<T: Data, S: Data, U: Data, F> Clone for ZippedPartitionsRdd<T, S, U, F>
where
    F: Fn(T, S) -> U + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        ZippedPartitionsRdd {
            first: self.first.clone(),
            second: self.second.clone(),
            vals: self.vals.clone(),
            f: self.f.clone(),
        }
    }
}

impl<T: Data, S: Data, U: Data, F> ZippedPartitionsRdd<T, S, U, F>
where
    F: Fn(T, S) -> U + Send + Sync + 'static,
{
    pub(crate) fn new(first: Arc<dyn Rdd<Item = T>>, second: Arc<dyn Rdd<Item = S>>, f: F) -> Self {
        let mut vals = RddVals::new(first.get_context(), OpKind::Zip);
        vals.dependencies
            .push(Dependency::NarrowDependency(Arc::new(
                OneToOneDependency::new(first.get_rdd_base()),
            )));
        vals.dependencies
            .push(Dependency::NarrowDependency(Arc::new(
                OneToOneDependency::new(second.get_rdd_base()),
            )));
        ZippedPartitionsRdd {
            first,
            second,
            vals: Arc::new(vals),
            f: Arc::new(f),
        }
    }
}

impl<T: Data, S: Data, U: Data, F> RddBase for ZippedPartitionsRdd<T, S, U, F>
where
    F: Fn(T, S) -> U + Send + Sync + 'static,
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
}

impl<T: Data, S: Data, U: Data, F> Rdd for ZippedPartitionsRdd<T, S, U, F>
where
    F: Fn(T, S) -> U + Send + Sync + 'static,
{
    type Item = U;
    fn get_rdd(&self) -> Arc<dyn Rdd<Item = Self::Item>> {
        Arc::new(self.clone())
    }

    fn get_rdd_base(&self) -> Arc<dyn RddBase> {
        Arc::new(self.clone()) as Arc<dyn RddBase>
    }

    fn compute(&self, split: usize) -> Result<Box<dyn Iterator<Item = Self::Item>>> {
        let first = self.first.iterator(split)?.collect::<Vec<_>>();
        let second = self.second.iterator(split)?.collect::<Vec<_>>();
        if first.len() != second.len() {
            return Err(Error::ZipMisaligned {
                rdd_id: self.vals.id,
                split,
                left: first.len(),
                right: second.len(),
            });
        }
        let f = self.f.clone();
        Ok(Box::new(
            first
                .into_iter()
                .zip(second.into_iter())
                .map(move |(a, b)| f(a, b)),
        ))
    }
}
