use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::Context;
use crate::dependency::{Dependency, OneToOneDependency};
use crate::error::Result;
use crate::rdd::{OpKind, Rdd, RddBase, RddVals};
use crate::serializable_traits::Data;

pub struct FlatMapperRdd<T: Data, U: Data, F>
where
    F: Fn(T) -> Box<dyn Iterator<Item = U>> + Send + Sync + 'static,
{
    prev: Arc<dyn Rdd<Item = T>>,
    vals: Arc<RddVals>,
    f: Arc<F>,
    _marker_t: PhantomData<T>,
}

impl<T: Data, U: Data, F> Clone for FlatMapperRdd<T, U, F>
where
    F: Fn(T) -> Box<dyn Iterator<Item = U>> + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        FlatMapperRdd {
            prev: self.prev.clone(),
            vals: self.vals.clone(),
            f: self.f.clone(),
            _marker_t: PhantomData,
        }
    }
}

impl<T: Data, U: Data, F> FlatMapperRdd<T, U, F>
where
    F: Fn(T) -> Box<dyn Iterator<Item = U>> + Send + Sync + 'static,
{
    pub(crate) fn new(prev: Arc<dyn Rdd<Item = T>>, f: F) -> Self {
        let mut vals = RddVals::new(prev.get_context(), OpKind::FlatMap);
        vals.dependencies
            .push(Dependency::NarrowDependency(Arc::new(
                OneToOneDependency::new(prev.get_rdd_base()),
            )));
        let vals = Arc::new(vals);
        FlatMapperRdd {
            prev,
            vals,
            f: Arc::new(f),
            _marker_t: PhantomData,
        }
    }
}

impl<T: Data, U: Data, F> RddBase for FlatMapperRdd<T, U, F>
where
    F: Fn(T) -> Box<dyn Iterator<Item = U>> + Send + Sync + 'static,
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
}

impl<T: Data, U: Data, F> Rdd for FlatMapperRdd<T, U, F>
where
    F: Fn(T) -> Box<dyn Iterator<Item = U>> + Send + Sync + 'static,
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
        Ok(Box::new(self.prev.iterator(split)?.flat_map(move |x| f(x))))
    }
}
