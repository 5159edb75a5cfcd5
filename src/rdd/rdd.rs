use std::cmp::Ordering;
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;

use crate::aggregator::Aggregator;
use crate::cache::Consumers;
use crate::context::Context;
use crate::dependency::Dependency;
use crate::error::{Error, Result};
use crate::io::file_writer;
use crate::partitioner::Partitioner;
use crate::rdd::*;
use crate::serializable_traits::{Data, Key};
use itertools::Itertools;
use parking_lot::Mutex;

/// Handle to a lazily evaluated, partitioned collection.
pub type Dia<T> = Arc<dyn Rdd<Item = T>>;

/// Operator that produced a node, as reported by [`RddBase::get_op_kind`].
#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    Parallelize,
    Generate,
    ReadLines,
    Map,
    FlatMap,
    MapPartitions,
    Zip,
    ZipWithIndex,
    Collapse,
    Cache,
    ReduceToIndex,
    GroupToIndex,
    ReducePair,
    GroupByKey,
    PartitionBy,
    MapValues,
    InnerJoin(JoinStrategy),
}

// Values which are needed for all RDDs
pub(crate) struct RddVals {
    pub id: usize,
    pub dependencies: Vec<Dependency>,
    pub op_kind: OpKind,
    pub context: Arc<Context>,
}

impl RddVals {
    pub fn new(sc: Arc<Context>, op_kind: OpKind) -> Self {
        RddVals {
            id: sc.new_rdd_id(),
            dependencies: Vec::new(),
            op_kind,
            context: sc,
        }
    }
}

// Rdd is split into the untyped RddBase, which is all the scheduler needs to walk the lineage
// graph, and the typed Rdd carrying compute and the operators.
pub trait RddBase: Send + Sync {
    fn get_rdd_id(&self) -> usize;
    fn get_context(&self) -> Arc<Context>;
    fn get_dependencies(&self) -> Vec<Dependency>;
    fn get_op_kind(&self) -> OpKind;
    /// Partitioning provenance of the records, `None` when unknown.
    fn partitioner(&self) -> Option<Partitioner> {
        None
    }
    fn number_of_splits(&self) -> usize {
        self.get_context().num_workers()
    }
    /// Whether this node owns physical storage of its records.
    fn is_storage_point(&self) -> bool {
        false
    }
    /// Whether the storage of this node holds every partition, so its lineage need not run.
    fn is_materialized(&self) -> bool {
        false
    }
    /// Whether the node needs a barrier stage of its own before it can be computed.
    fn needs_barrier_stage(&self) -> bool {
        false
    }
    fn run_barrier_task(&self, _split: usize) -> Result<usize> {
        Err(Error::UnsupportedOperation("barrier task on a pipelined node"))
    }
    fn complete_barrier(&self, _counts: Vec<usize>) -> Result<()> {
        Ok(())
    }
    /// Allows more reads of the nearest storage points this node reads from.
    fn add_consumers(&self, consumers: Consumers) {
        for dep in self.get_dependencies() {
            if let Dependency::NarrowDependency(nar_dep) = dep {
                nar_dep.get_rdd_base().add_consumers(consumers);
            }
        }
    }
}

impl PartialOrd for dyn RddBase {
    fn partial_cmp(&self, other: &dyn RddBase) -> Option<Ordering> {
        Some(self.get_rdd_id().cmp(&other.get_rdd_id()))
    }
}

impl PartialEq for dyn RddBase {
    fn eq(&self, other: &dyn RddBase) -> bool {
        self.get_rdd_id() == other.get_rdd_id()
    }
}

impl Eq for dyn RddBase {}

impl Ord for dyn RddBase {
    fn cmp(&self, other: &dyn RddBase) -> Ordering {
        self.get_rdd_id().cmp(&other.get_rdd_id())
    }
}

impl<I: Rdd + ?Sized> RddBase for Arc<I> {
    fn get_rdd_id(&self) -> usize {
        (**self).get_rdd_id()
    }
    fn get_context(&self) -> Arc<Context> {
        (**self).get_context()
    }
    fn get_dependencies(&self) -> Vec<Dependency> {
        (**self).get_dependencies()
    }
    fn get_op_kind(&self) -> OpKind {
        (**self).get_op_kind()
    }
    fn partitioner(&self) -> Option<Partitioner> {
        (**self).partitioner()
    }
    fn number_of_splits(&self) -> usize {
        (**self).number_of_splits()
    }
    fn is_storage_point(&self) -> bool {
        (**self).is_storage_point()
    }
    fn is_materialized(&self) -> bool {
        (**self).is_materialized()
    }
    fn needs_barrier_stage(&self) -> bool {
        (**self).needs_barrier_stage()
    }
    fn run_barrier_task(&self, split: usize) -> Result<usize> {
        (**self).run_barrier_task(split)
    }
    fn complete_barrier(&self, counts: Vec<usize>) -> Result<()> {
        (**self).complete_barrier(counts)
    }
    fn add_consumers(&self, consumers: Consumers) {
        (**self).add_consumers(consumers)
    }
}

impl<I: Rdd + ?Sized> Rdd for Arc<I> {
    type Item = I::Item;
    fn get_rdd(&self) -> Arc<dyn Rdd<Item = Self::Item>> {
        (**self).get_rdd()
    }
    fn get_rdd_base(&self) -> Arc<dyn RddBase> {
        (**self).get_rdd_base()
    }
    fn compute(&self, split: usize) -> Result<Box<dyn Iterator<Item = Self::Item>>> {
        (**self).compute(split)
    }
    fn iterator(&self, split: usize) -> Result<Box<dyn Iterator<Item = Self::Item>>> {
        (**self).iterator(split)
    }
}

/// Deferred result of an action registered with [`Rdd::size_future`].
///
/// The action runs together with the next job started on the context, or when the future is
/// read. Reading takes the future by value, so it happens exactly once.
pub struct ActionFuture<T> {
    slot: Arc<Mutex<Option<Result<T>>>>,
    context: Arc<Context>,
}

impl<T> ActionFuture<T> {
    pub fn get(self) -> Result<T> {
        self.context.run_pending_actions();
        self.slot
            .lock()
            .take()
            .unwrap_or(Err(Error::UnsupportedOperation("deferred action did not run")))
    }
}

// Rdd containing methods associated with processing
pub trait Rdd: RddBase + 'static {
    type Item: Data;
    fn get_rdd(&self) -> Arc<dyn Rdd<Item = Self::Item>>;

    fn get_rdd_base(&self) -> Arc<dyn RddBase>;

    fn compute(&self, split: usize) -> Result<Box<dyn Iterator<Item = Self::Item>>>;

    fn iterator(&self, split: usize) -> Result<Box<dyn Iterator<Item = Self::Item>>> {
        self.compute(split)
    }

    fn map<U: Data, F>(&self, f: F) -> Dia<U>
    where
        F: Fn(Self::Item) -> U + Send + Sync + 'static,
        Self: Sized,
    {
        Arc::new(MapperRdd::new(self.get_rdd(), f))
    }

    /// Like `map`, but the first failing record fails the stage.
    fn try_map<U: Data, F>(&self, f: F) -> Dia<U>
    where
        F: Fn(Self::Item) -> Result<U> + Send + Sync + 'static,
        Self: Sized,
    {
        let f = Arc::new(f);
        Arc::new(MapPartitionsRdd::new(
            self.get_rdd(),
            move |_, iter: Box<dyn Iterator<Item = Self::Item>>| {
                let mapped = iter.map(|item| f(item)).collect::<Result<Vec<U>>>()?;
                Ok(Box::new(mapped.into_iter()) as Box<dyn Iterator<Item = U>>)
            },
            OpKind::Map,
            false,
        ))
    }

    fn flat_map<U: Data, F>(&self, f: F) -> Dia<U>
    where
        F: Fn(Self::Item) -> Box<dyn Iterator<Item = U>> + Send + Sync + 'static,
        Self: Sized,
    {
        Arc::new(FlatMapperRdd::new(self.get_rdd(), f))
    }

    /// Return a new collection by applying a function to each partition of this one.
    fn map_partitions<U: Data, F>(&self, func: F) -> Dia<U>
    where
        F: Fn(Box<dyn Iterator<Item = Self::Item>>) -> Box<dyn Iterator<Item = U>>
            + Send
            + Sync
            + 'static,
        Self: Sized,
    {
        self.map_partitions_with_index(move |_index, items| func(items))
    }

    /// Like `map_partitions`, also passing the partition index.
    fn map_partitions_with_index<U: Data, F>(&self, func: F) -> Dia<U>
    where
        F: Fn(usize, Box<dyn Iterator<Item = Self::Item>>) -> Box<dyn Iterator<Item = U>>
            + Send
            + Sync
            + 'static,
        Self: Sized,
    {
        Arc::new(MapPartitionsRdd::new(
            self.get_rdd(),
            move |index, items| Ok(func(index, items)),
            OpKind::MapPartitions,
            false,
        ))
    }

    /// Pairs records positionally; partition `p` of both inputs must hold equally many records.
    fn zip<S: Data>(&self, second: &Dia<S>) -> Dia<(Self::Item, S)>
    where
        Self: Sized,
    {
        self.zip_with(second, |first, second| (first, second))
    }

    fn zip_with<S: Data, U: Data, F>(&self, second: &Dia<S>, f: F) -> Dia<U>
    where
        F: Fn(Self::Item, S) -> U + Send + Sync + 'static,
        Self: Sized,
    {
        Arc::new(ZippedPartitionsRdd::new(self.get_rdd(), second.clone(), f))
    }

    /// Passes every record together with its global position. Counts its input in a barrier
    /// stage first, so the input is read twice.
    fn zip_with_index<U: Data, F>(&self, f: F) -> Dia<U>
    where
        F: Fn(Self::Item, usize) -> U + Send + Sync + 'static,
        Self: Sized,
    {
        Arc::new(ZipWithIndexRdd::new(self.get_rdd(), f))
    }

    /// Identity node keeping the partitioning of its input.
    fn collapse(&self) -> Dia<Self::Item>
    where
        Self: Sized,
    {
        Arc::new(MapPartitionsRdd::new(
            self.get_rdd(),
            |_, items| Ok(items),
            OpKind::Collapse,
            true,
        ))
    }

    /// Marks the collection as a storage point: it is materialized once, then read from memory.
    fn cache(&self) -> Dia<Self::Item>
    where
        Self: Sized,
    {
        Arc::new(CachedRdd::new(self.get_rdd()))
    }

    /// Allows one more read of the underlying storage.
    fn keep(&self) -> &Self
    where
        Self: Sized,
    {
        self.keep_by(1)
    }

    fn keep_by(&self, consumers: usize) -> &Self
    where
        Self: Sized,
    {
        self.add_consumers(Consumers::Keep(consumers));
        self
    }

    /// Never frees the underlying storage.
    fn keep_forever(&self) -> &Self
    where
        Self: Sized,
    {
        self.add_consumers(Consumers::Forever);
        self
    }

    /// Folds all records with equal index, yielding exactly `universe` records in index order;
    /// `neutral` stands in for an index without input.
    fn reduce_to_index<KF, F>(
        &self,
        key_fn: KF,
        combine: F,
        universe: usize,
        neutral: Self::Item,
    ) -> Dia<Self::Item>
    where
        KF: Fn(&Self::Item) -> usize + Send + Sync + 'static,
        F: Fn(Self::Item, Self::Item) -> Self::Item + Send + Sync + 'static,
        Self: Sized,
    {
        let keyed = self.map(move |item| (key_fn(&item), item));
        Arc::new(IndexedRdd::new(
            keyed,
            Arc::new(Aggregator::reducing(combine)),
            universe,
            move |_, combined: Option<Self::Item>| combined.unwrap_or_else(|| neutral.clone()),
            OpKind::ReduceToIndex,
        ))
    }

    /// Hands all records with equal index, in arrival order, to `group_fn`, yielding exactly
    /// `universe` records in index order.
    fn group_to_index<U: Data, KF, G>(
        &self,
        key_fn: KF,
        group_fn: G,
        universe: usize,
        neutral: U,
    ) -> Dia<U>
    where
        KF: Fn(&Self::Item) -> usize + Send + Sync + 'static,
        G: Fn(Box<dyn Iterator<Item = Self::Item>>, usize) -> U + Send + Sync + 'static,
        Self: Sized,
    {
        let keyed = self.map(move |item| (key_fn(&item), item));
        Arc::new(IndexedRdd::new(
            keyed,
            Arc::new(Aggregator::default()),
            universe,
            move |index, group: Option<Vec<Self::Item>>| match group {
                Some(items) => group_fn(Box::new(items.into_iter()), index),
                None => neutral.clone(),
            },
            OpKind::GroupToIndex,
        ))
    }

    /// Hash-partitions by `key_fn` and hands each key's records, in arrival order, to
    /// `group_fn`.
    fn group_by_key<K: Key, U: Data, KF, G>(&self, key_fn: KF, group_fn: G) -> Dia<U>
    where
        KF: Fn(&Self::Item) -> K + Send + Sync + 'static,
        G: Fn(&K, Box<dyn Iterator<Item = Self::Item>>) -> U + Send + Sync + 'static,
        Self: Sized,
    {
        let keyed = self.map(move |item| (key_fn(&item), item));
        let partitioner = Partitioner::hash::<K>(self.number_of_splits());
        let grouped: Dia<(K, Vec<Self::Item>)> = Arc::new(ShuffledRdd::new(
            keyed,
            Arc::new(Aggregator::default()),
            partitioner,
            OpKind::GroupByKey,
        ));
        let group_fn = Arc::new(group_fn);
        Arc::new(MapPartitionsRdd::new(
            grouped,
            move |_, groups: Box<dyn Iterator<Item = (K, Vec<Self::Item>)>>| {
                let group_fn = group_fn.clone();
                Ok(Box::new(
                    groups.map(move |(k, items)| group_fn(&k, Box::new(items.into_iter()))),
                ) as Box<dyn Iterator<Item = U>>)
            },
            OpKind::MapPartitions,
            true,
        ))
    }

    /// Equi-join on `left_key(l) == right_key(r)`, emitting `join_fn(l, r)` for every matching
    /// pair. With location detection enabled and both inputs partitioned alike, no record moves.
    fn inner_join<R: Data, K: Key, U: Data, LK, RK, J>(
        &self,
        location: LocationDetection,
        right: &Dia<R>,
        left_key: LK,
        right_key: RK,
        join_fn: J,
    ) -> Dia<U>
    where
        LK: Fn(&Self::Item) -> K + Send + Sync + 'static,
        RK: Fn(&R) -> K + Send + Sync + 'static,
        J: Fn(&Self::Item, &R) -> U + Send + Sync + 'static,
        Self: Sized,
    {
        Arc::new(JoinedRdd::new(
            location,
            self.get_rdd(),
            right.clone(),
            left_key,
            right_key,
            join_fn,
        ))
    }

    fn collect(&self) -> Result<Vec<Self::Item>>
    where
        Self: Sized,
    {
        let cl = |iter: Box<dyn Iterator<Item = Self::Item>>| iter.collect::<Vec<Self::Item>>();
        let results = self.get_context().run_job(self.get_rdd(), cl)?;
        let size = results.iter().fold(0, |a, b: &Vec<Self::Item>| a + b.len());
        Ok(results
            .into_iter()
            .fold(Vec::with_capacity(size), |mut acc, v| {
                acc.extend(v);
                acc
            }))
    }

    fn count(&self) -> Result<usize>
    where
        Self: Sized,
    {
        let context = self.get_context();
        let counting_func = |iter: Box<dyn Iterator<Item = Self::Item>>| iter.count();
        Ok(context
            .run_job(self.get_rdd(), counting_func)?
            .into_iter()
            .sum())
    }

    /// Number of records; same as `count`.
    fn size(&self) -> Result<usize>
    where
        Self: Sized,
    {
        self.count()
    }

    /// Registers a deferred count, see [`ActionFuture`].
    fn size_future(&self) -> ActionFuture<usize>
    where
        Self: Sized,
    {
        let context = self.get_context();
        let slot = Arc::new(Mutex::new(None));
        let rdd = self.get_rdd();
        let action_slot = slot.clone();
        context.defer_action(Box::new(move || {
            let size = rdd.count();
            *action_slot.lock() = Some(size);
        }));
        ActionFuture { slot, context }
    }

    fn sum(&self) -> Result<Self::Item>
    where
        Self::Item: std::iter::Sum,
        Self: Sized,
    {
        let summing_func = |iter: Box<dyn Iterator<Item = Self::Item>>| iter.sum::<Self::Item>();
        Ok(self
            .get_context()
            .run_job(self.get_rdd(), summing_func)?
            .into_iter()
            .sum())
    }

    fn max(&self) -> Result<Option<Self::Item>>
    where
        Self::Item: PartialOrd,
        Self: Sized,
    {
        self.reduce(|a, b| if b > a { b } else { a })
    }

    fn min(&self) -> Result<Option<Self::Item>>
    where
        Self::Item: PartialOrd,
        Self: Sized,
    {
        self.reduce(|a, b| if b < a { b } else { a })
    }

    fn reduce<F>(&self, f: F) -> Result<Option<Self::Item>>
    where
        Self: Sized,
        F: Fn(Self::Item, Self::Item) -> Self::Item + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let cf = f.clone();
        let reduce_partition =
            move |iter: Box<dyn Iterator<Item = Self::Item>>| iter.fold1(|a, b| cf(a, b));
        let results = self.get_context().run_job(self.get_rdd(), reduce_partition)?;
        Ok(results.into_iter().flatten().fold1(|a, b| f(a, b)))
    }

    /// Aggregate the records of each partition, and then the results for all the partitions,
    /// using a given associative function and a neutral "initial value".
    fn fold<F>(&self, init: Self::Item, f: F) -> Result<Self::Item>
    where
        Self: Sized,
        F: Fn(Self::Item, Self::Item) -> Self::Item + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let cf = f.clone();
        let zero = init.clone();
        let reduce_partition = move |iter: Box<dyn Iterator<Item = Self::Item>>| {
            iter.fold(zero.clone(), |a, b| cf(a, b))
        };
        let results = self.get_context().run_job(self.get_rdd(), reduce_partition)?;
        Ok(results.into_iter().fold(init, |a, b| f(a, b)))
    }

    /// Forces evaluation: a storage point is materialized without counting as a read, any other
    /// node is computed and its records dropped.
    fn execute(&self) -> Result<()>
    where
        Self: Sized,
    {
        if self.is_storage_point() {
            self.get_context().materialize(self.get_rdd_base())
        } else {
            self.get_context()
                .run_job(self.get_rdd(), |iter: Box<dyn Iterator<Item = Self::Item>>| {
                    iter.count()
                })
                .map(|_| ())
        }
    }

    /// Writes one file per partition, one record per line, following `pattern` (see
    /// [`file_writer::shard_path`]). Returns the written paths in partition order.
    fn write_lines(&self, pattern: &str) -> Result<Vec<PathBuf>>
    where
        Self::Item: Display,
        Self: Sized,
    {
        let pattern = pattern.to_string();
        self.get_context()
            .run_job_with_context(self.get_rdd(), move |task, iter| {
                file_writer::write_partition(&pattern, task.split_id, iter)
            })
    }

    /// Logs every record, prefixed by `label` and its position.
    fn print(&self, label: &str) -> Result<()>
    where
        Self: Sized,
    {
        let records = self.collect()?;
        log::info!(
            "{} --- Begin collection #{} --- size={}",
            label,
            self.get_rdd_id(),
            records.len()
        );
        for (i, record) in records.iter().enumerate() {
            log::info!("{}[{}] {:?}", label, i, record);
        }
        log::info!("{} --- End collection #{} ---", label, self.get_rdd_id());
        Ok(())
    }
}
