use std::marker::PhantomData;
use std::sync::Arc;

use crate::aggregator::Aggregator;
use crate::context::Context;
use crate::dependency::{Dependency, OneToOneDependency};
use crate::error::Result;
use crate::partitioner::Partitioner;
use crate::rdd::{Dia, MapPartitionsRdd, OpKind, Rdd, RddBase, RddVals, ShuffledRdd};
use crate::serializable_traits::{Data, Key};

// Keyed operators, available on every collection of pairs.
pub trait PairRdd<K: Key, V: Data>: Rdd<Item = (K, V)> + Send + Sync {
    fn combine_by_key<C: Data>(
        &self,
        aggregator: Aggregator<V, C>,
        partitioner: Partitioner,
        op_kind: OpKind,
    ) -> Dia<(K, C)>
    where
        Self: Sized,
    {
        Arc::new(ShuffledRdd::new(
            self.get_rdd(),
            Arc::new(aggregator),
            partitioner,
            op_kind,
        ))
    }

    /// Folds the values of every key; the output is hash partitioned by key.
    fn reduce_pair<F>(&self, func: F) -> Dia<(K, V)>
    where
        F: Fn(V, V) -> V + Send + Sync + 'static,
        Self: Sized,
    {
        let partitioner = Partitioner::hash::<K>(self.number_of_splits());
        self.reduce_pair_using_partitioner(func, partitioner)
    }

    /// Folds the values of every key, placing the pairs with `partitioner`.
    fn reduce_pair_using_partitioner<F>(&self, func: F, partitioner: Partitioner) -> Dia<(K, V)>
    where
        F: Fn(V, V) -> V + Send + Sync + 'static,
        Self: Sized,
    {
        self.combine_by_key(Aggregator::reducing(func), partitioner, OpKind::ReducePair)
    }

    /// Transforms the values; keys, and hence the partitioning, stay as they are.
    fn map_values<U: Data, F>(&self, f: F) -> Dia<(K, U)>
    where
        F: Fn(V) -> U + Send + Sync + 'static,
        Self: Sized,
    {
        Arc::new(MappedValuesRdd::new(self.get_rdd(), f))
    }

    /// Moves every pair to the partition `partitioner` assigns its key. Pairs of one key end
    /// up adjacent, keys in order of first arrival.
    fn partition_by(&self, partitioner: Partitioner) -> Dia<(K, V)>
    where
        Self: Sized,
    {
        let grouped = self.combine_by_key(
            Aggregator::<V, Vec<V>>::default(),
            partitioner,
            OpKind::PartitionBy,
        );
        Arc::new(MapPartitionsRdd::new(
            grouped,
            |_, groups: Box<dyn Iterator<Item = (K, Vec<V>)>>| {
                Ok(Box::new(groups.flat_map(|(k, values)| {
                    values.into_iter().map(move |v| (k.clone(), v))
                })) as Box<dyn Iterator<Item = (K, V)>>)
            },
            OpKind::PartitionBy,
            true,
        ))
    }
}

impl<K: Key, V: Data, T> PairRdd<K, V> for T where T: Rdd<Item = (K, V)> {}

pub struct MappedValuesRdd<K: Data, V: Data, U: Data, F>
where
    F: Fn(V) -> U + Send + Sync + 'static,
{
    prev: Arc<dyn Rdd<Item = (K, V)>>,
    vals: Arc<RddVals>,
    f: Arc<F>,
    _marker_t: PhantomData<K>, // phantom data is necessary because of type parameter T
    _marker_v: PhantomData<V>,
    _marker_u: PhantomData<U>,
}

impl<K: Data, V: Data, U: Data, F> Clone for MappedValuesRdd<K, V, U, F>
where
    F: Fn(V) -> U + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        MappedValuesRdd {
            prev: self.prev.clone(),
            vals: self.vals.clone(),
            f: self.f.clone(),
            _marker_t: PhantomData,
            _marker_v: PhantomData,
            _marker_u: PhantomData,
        }
    }
}

impl<K: Data, V: Data, U: Data, F> MappedValuesRdd<K, V, U, F>
where
    F: Fn(V) -> U + Send + Sync + 'static,
{
    fn new(prev: Arc<dyn Rdd<Item = (K, V)>>, f: F) -> Self {
        let mut vals = RddVals::new(prev.get_context(), OpKind::MapValues);
        vals.dependencies
            .push(Dependency::NarrowDependency(Arc::new(
                OneToOneDependency::new(prev.get_rdd_base()),
            )));
        let vals = Arc::new(vals);
        MappedValuesRdd {
            prev,
            vals,
            f: Arc::new(f),
            _marker_t: PhantomData,
            _marker_v: PhantomData,
            _marker_u: PhantomData,
        }
    }
}

impl<K: Data, V: Data, U: Data, F> RddBase for MappedValuesRdd<K, V, U, F>
where
    F: Fn(V) -> U + Send + Sync + 'static,
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
        self.prev.partitioner()
    }

    fn number_of_splits(&self) -> usize {
        self.prev.number_of_splits()
    }
}

impl<K: Data, V: Data, U: Data, F> Rdd for MappedValuesRdd<K, V, U, F>
where
    F: Fn(V) -> U + Send + Sync + 'static,
{
    type Item = (K, U);
    fn get_rdd_base(&self) -> Arc<dyn RddBase> {
        Arc::new(self.clone()) as Arc<dyn RddBase>
    }

    fn get_rdd(&self) -> Arc<dyn Rdd<Item = Self::Item>> {
        Arc::new(self.clone())
    }

    fn compute(&self, split: usize) -> Result<Box<dyn Iterator<Item = Self::Item>>> {
        let f = self.f.clone();
        Ok(Box::new(
            self.prev.iterator(split)?.map(move |(k, v)| (k, f(v))),
        ))
    }
}
