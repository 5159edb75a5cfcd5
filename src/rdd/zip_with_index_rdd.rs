use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::Context;
use crate::dependency::{Dependency, OneToOneDependency};
use crate::error::{Error, Result};
use crate::rdd::{OpKind, Rdd, RddBase, RddVals};
use crate::serializable_traits::Data;
use once_cell::sync::OnceCell;

/// Numbers the records of its parent globally: partition `p` starts at the number of records
/// held by partitions `0..p`, which a barrier stage counts before the first read.
pub struct ZipWithIndexRdd<T: Data, U: Data, F>
where
    F: Fn(T, usize) -> U + Send + Sync + 'static,
{
    prev: Arc<dyn Rdd<Item = T>>,
    vals: Arc<RddVals>,
    f: Arc<F>,
    offsets: Arc<OnceCell<Vec<usize>>>,
    _marker_t: PhantomData<T>,
}

impl<T: Data, U: Data, F> Clone for ZipWithIndexRdd<T, U, F>
where
    F: Fn(T, usize) -> U + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        ZipWithIndexRdd {
            prev: self.prev.clone(),
            vals: self.vals.clone(),
            f: self.f.clone(),
            offsets: self.offsets.clone(),
            _marker_t: PhantomData,
        }
    }
}

impl<T: Data, U: Data, F> ZipWithIndexRdd<T, U, F>
where
    F: Fn(T, usize) -> U + Send + Sync + 'static,
{
    pub(crate) fn new(prev: Arc<dyn Rdd<Item = T>>, f: F) -> Self {
        let mut vals = RddVals::new(prev.get_context(), OpKind::ZipWithIndex);
        vals.dependencies
            .push(Dependency::NarrowDependency(Arc::new(
                OneToOneDependency::new(prev.get_rdd_base()),
            )));
        ZipWithIndexRdd {
            prev,
            vals: Arc::new(vals),
            f: Arc::new(f),
            offsets: Arc::new(OnceCell::new()),
            _marker_t: PhantomData,
        }
    }
}

impl<T: Data, U: Data, F> RddBase for ZipWithIndexRdd<T, U, F>
where
    F: Fn(T, usize) -> U + Send + Sync + 'static,
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

    fn number_of_splits(&self) -> usize {
        self.prev.number_of_splits()
    }

    fn needs_barrier_stage(&self) -> bool {
        self.offsets.get().is_none()
    }

    fn run_barrier_task(&self, split: usize) -> Result<usize> {
        Ok(self.prev.iterator(split)?.count())
    }

    fn complete_barrier(&self, counts: Vec<usize>) -> Result<()> {
        let offsets = counts
            .iter()
            .scan(0, |acc, &count| {
                let start = *acc;
                *acc += count;
                Some(start)
            })
            .collect::<Vec<_>>();
        log::debug!("index offsets of #{}: {:?}", self.vals.id, offsets);
        let _ = self.offsets.set(offsets);
        Ok(())
    }
}

impl<T: Data, U: Data, F> Rdd for ZipWithIndexRdd<T, U, F>
where
    F: Fn(T, usize) -> U + Send + Sync + 'static,
{
    type Item = U;
    fn get_rdd(&self) -> Arc<dyn Rdd<Item = Self::Item>> {
        Arc::new(self.clone())
    }

    fn get_rdd_base(&self) -> Arc<dyn RddBase> {
        Arc::new(self.clone()) as Arc<dyn RddBase>
    }

    fn compute(&self, split: usize) -> Result<Box<dyn Iterator<Item = Self::Item>>> {
        let start = self
            .offsets
            .get()
            .and_then(|offsets| offsets.get(split).copied())
            .ok_or(Error::UnsupportedOperation(
                "index numbering read before its counting stage",
            ))?;
        let f = self.f.clone();
        Ok(Box::new(
            self.prev
                .iterator(split)?
                .enumerate()
                .map(move |(i, item)| f(item, start + i)),
        ))
    }
}
