use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::aggregator::{Aggregator, OrderedCombiners};
use crate::cache::{ConsumeCounter, Consumers};
use crate::context::Context;
use crate::dependency::{Dependency, OneToOneDependency, ShuffleDependency};
use crate::error::{Error, Result};
use crate::partitioner::Partitioner;
use crate::rdd::{
    read_limit, read_partition, store_partition, Dia, OpKind, Rdd, RddBase, RddVals,
};
use crate::serializable_traits::{Data, Key};
use crate::shuffle::ShuffleFetcher;
use dashmap::DashMap;
use parking_lot::Mutex;

/// Whether a join may trust the partitioners its inputs carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationDetection {
    Enabled,
    Disabled,
}

impl fmt::Display for LocationDetection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationDetection::Enabled => write!(f, "ON"),
            LocationDetection::Disabled => write!(f, "OFF"),
        }
    }
}

/// How a join brings equal keys of both inputs onto the same partition.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinStrategy {
    /// Both inputs are already placed by `partitioner`; nothing moves.
    Local { partitioner: Partitioner },
    /// Sides not marked in place are shuffled to `target`.
    Shuffle {
        target: Partitioner,
        left_in_place: bool,
        right_in_place: bool,
    },
}

impl JoinStrategy {
    pub fn target(&self) -> &Partitioner {
        match self {
            JoinStrategy::Local { partitioner } => partitioner,
            JoinStrategy::Shuffle { target, .. } => target,
        }
    }

    pub fn left_in_place(&self) -> bool {
        match self {
            JoinStrategy::Local { .. } => true,
            JoinStrategy::Shuffle { left_in_place, .. } => *left_in_place,
        }
    }

    pub fn right_in_place(&self) -> bool {
        match self {
            JoinStrategy::Local { .. } => true,
            JoinStrategy::Shuffle { right_in_place, .. } => *right_in_place,
        }
    }
}

/// Picks the join strategy from the partitioners of both inputs.
///
/// A partitioner is usable when it routes keys of type `K` over `partitions` partitions. With
/// detection enabled, two equal usable partitioners make the join local; otherwise the first
/// usable one becomes the shuffle target and only the other side moves. Without a usable
/// partitioner, or with detection disabled, both sides are hashed.
pub fn select_join_strategy<K: Key>(
    location: LocationDetection,
    left: Option<&Partitioner>,
    right: Option<&Partitioner>,
    partitions: usize,
) -> JoinStrategy {
    let hashed = JoinStrategy::Shuffle {
        target: Partitioner::hash::<K>(partitions),
        left_in_place: false,
        right_in_place: false,
    };
    if location == LocationDetection::Disabled {
        return hashed;
    }
    let usable = |tag: Option<&Partitioner>| {
        tag.filter(|p| p.accepts_key::<K>() && p.get_num_of_partitions() == partitions)
            .cloned()
    };
    match (usable(left), usable(right)) {
        (Some(l), Some(r)) if l == r => JoinStrategy::Local { partitioner: l },
        (Some(target), _) => JoinStrategy::Shuffle {
            target,
            left_in_place: true,
            right_in_place: false,
        },
        (None, Some(target)) => JoinStrategy::Shuffle {
            target,
            left_in_place: false,
            right_in_place: true,
        },
        (None, None) => hashed,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Unchecked,
    // every record already sits on the partition the target routes it to
    InPlace,
    // some record did not; all records of the input went through a shuffle
    Moved,
}

// Records of an input the join reads in place, checked against the target partitioner in the
// join's barrier stage before any partition is joined.
struct PlacementCheck<K, T> {
    storage_id: usize,
    shuffle_id: usize,
    // (read partition, owning partition) -> groups
    staged: DashMap<(usize, usize), Vec<(K, Vec<T>)>>,
    misplaced: AtomicUsize,
    placement: Mutex<Placement>,
}

// One input of the join: either read where it is, or fetched from a shuffle.
enum JoinSide<T: Data, K: Key> {
    InPlace {
        rdd: Dia<T>,
        key_fn: Arc<dyn Fn(&T) -> K + Send + Sync>,
        check: Arc<PlacementCheck<K, T>>,
    },
    Shuffled {
        shuffle_id: usize,
    },
}

impl<T: Data, K: Key> Clone for JoinSide<T, K> {
    fn clone(&self) -> Self {
        match self {
            JoinSide::InPlace { rdd, key_fn, check } => JoinSide::InPlace {
                rdd: rdd.clone(),
                key_fn: key_fn.clone(),
                check: check.clone(),
            },
            JoinSide::Shuffled { shuffle_id } => JoinSide::Shuffled {
                shuffle_id: *shuffle_id,
            },
        }
    }
}

fn push_group<T>(mut items: Vec<T>, item: T) -> Vec<T> {
    items.push(item);
    items
}

fn merge_groups<T>(mut items: Vec<T>, more: Vec<T>) -> Vec<T> {
    items.extend(more);
    items
}

impl<T: Data, K: Key> JoinSide<T, K> {
    fn new(
        rdd: Dia<T>,
        key_fn: Arc<dyn Fn(&T) -> K + Send + Sync>,
        in_place: bool,
        target: &Partitioner,
        dependencies: &mut Vec<Dependency>,
    ) -> Self {
        let context = rdd.get_context();
        if in_place {
            dependencies.push(Dependency::NarrowDependency(Arc::new(
                OneToOneDependency::new(rdd.get_rdd_base()),
            )));
            let check = PlacementCheck {
                storage_id: context.new_rdd_id(),
                shuffle_id: context.new_shuffle_id(),
                staged: DashMap::new(),
                misplaced: AtomicUsize::new(0),
                placement: Mutex::new(Placement::Unchecked),
            };
            return JoinSide::InPlace {
                rdd,
                key_fn,
                check: Arc::new(check),
            };
        }
        let shuffle_id = context.new_shuffle_id();
        let keyed: Dia<(K, T)> = rdd.map(move |item| (key_fn(&item), item));
        dependencies.push(Dependency::ShuffleDependency(Arc::new(
            ShuffleDependency::new(
                shuffle_id,
                keyed,
                Arc::new(Aggregator::<T, Vec<T>>::default()),
                target.clone(),
            )
            .routing_all_keys(),
        )));
        JoinSide::Shuffled { shuffle_id }
    }

    fn is_checked(&self) -> bool {
        match self {
            JoinSide::InPlace { check, .. } => *check.placement.lock() != Placement::Unchecked,
            JoinSide::Shuffled { .. } => true,
        }
    }

    /// Reads partition `split` of an unchecked in-place input and groups its records by the
    /// partition `target` routes their keys to. Returns the number of records read.
    fn stage(&self, split: usize, target: &Partitioner) -> Result<usize> {
        let (rdd, key_fn, check) = match self {
            JoinSide::InPlace { rdd, key_fn, check } if !self.is_checked() => {
                (rdd, key_fn, check)
            }
            _ => return Ok(0),
        };
        let mut owners: Vec<OrderedCombiners<K, Vec<T>>> = (0..target.get_num_of_partitions())
            .map(|_| OrderedCombiners::new())
            .collect();
        let (mut records, mut misplaced) = (0, 0);
        for item in rdd.iterator(split)? {
            records += 1;
            let key = key_fn(&item);
            let owner = target.route(&key)?;
            if owner != split {
                misplaced += 1;
            }
            owners[owner].combine(key, item, |v| vec![v], push_group);
        }
        for (owner, groups) in owners.into_iter().enumerate() {
            check.staged.insert((split, owner), groups.into_vec());
        }
        check.misplaced.fetch_add(misplaced, Ordering::SeqCst);
        Ok(records)
    }

    /// Settles where an in-place input is read from once every partition has been staged: from
    /// memory if nothing was misplaced, otherwise through a shuffle of the staged groups.
    fn settle(&self, context: &Context, partitions: usize) -> Result<()> {
        let check = match self {
            JoinSide::InPlace { check, .. } if !self.is_checked() => check,
            _ => return Ok(()),
        };
        let misplaced = check.misplaced.swap(0, Ordering::SeqCst);
        let placement = if misplaced == 0 {
            for split in 0..partitions {
                let groups = check
                    .staged
                    .remove(&(split, split))
                    .map(|(_, groups)| groups)
                    .unwrap_or_default();
                store_partition(context, check.storage_id, split, groups);
            }
            Placement::InPlace
        } else {
            log::warn!(
                "{} records of a join input are not where its partitioner claims, shuffling it (#{})",
                misplaced,
                check.shuffle_id
            );
            let manager = &context.shuffle_manager;
            for map_id in 0..partitions {
                for reduce_id in 0..partitions {
                    let groups = check
                        .staged
                        .remove(&(map_id, reduce_id))
                        .map(|(_, groups)| groups)
                        .unwrap_or_default();
                    let bytes = bincode::serialize(&groups)?;
                    manager.put_bucket(check.shuffle_id, map_id, reduce_id, bytes);
                }
            }
            manager.register_map_outputs(check.shuffle_id, partitions, partitions);
            Placement::Moved
        };
        check.staged.clear();
        *check.placement.lock() = placement;
        Ok(())
    }

    /// Records of partition `split` grouped by key, keys in order of first appearance.
    fn groups(
        &self,
        context: &Context,
        split: usize,
        consumers: &ConsumeCounter,
        rdd_id: usize,
    ) -> Result<OrderedCombiners<K, Vec<T>>> {
        let mut groups = OrderedCombiners::new();
        let shuffle_id = match self {
            JoinSide::Shuffled { shuffle_id } => *shuffle_id,
            JoinSide::InPlace { check, .. } => {
                let placement = *check.placement.lock();
                match placement {
                    Placement::Moved => check.shuffle_id,
                    Placement::InPlace => {
                        let staged = read_partition::<(K, Vec<T>)>(
                            context,
                            check.storage_id,
                            split,
                            consumers,
                        )
                        .map_err(|e| match e {
                            Error::UseAfterConsume { .. } => Error::UseAfterConsume { rdd_id },
                            e => e,
                        })?
                        .ok_or(Error::UnsupportedOperation(
                            "join input read before its placement check",
                        ))?;
                        for (key, items) in staged {
                            groups.combine(key, items, |vs| vs, merge_groups);
                        }
                        return Ok(groups);
                    }
                    Placement::Unchecked => {
                        return Err(Error::UnsupportedOperation(
                            "join input read before its placement check",
                        ))
                    }
                }
            }
        };
        ShuffleFetcher::fetch(
            &context.shuffle_manager,
            shuffle_id,
            split,
            read_limit(context, consumers),
            rdd_id,
            |(key, items): (K, Vec<T>)| groups.combine(key, items, |vs| vs, merge_groups),
        )?;
        Ok(groups)
    }
}

/// Inner equi-join of two collections.
///
/// Inputs the strategy reads in place are checked in a barrier stage: when a record's key is
/// routed to a partition other than the one holding it, that input is shuffled after all, so
/// the result never depends on whether location detection was on.
pub struct JoinedRdd<L: Data, R: Data, K: Key, U: Data> {
    vals: Arc<RddVals>,
    strategy: JoinStrategy,
    left: JoinSide<L, K>,
    right: JoinSide<R, K>,
    join_fn: Arc<dyn Fn(&L, &R) -> U + Send + Sync>,
    consumers: Arc<ConsumeCounter>,
}

impl<L: Data, R: Data, K: Key, U: Data> Clone for JoinedRdd<L, R, K, U> {
    fn clone(&self) -> Self {
        JoinedRdd {
            vals: self.vals.clone(),
            strategy: self.strategy.clone(),
            left: self.left.clone(),
            right: self.right.clone(),
            join_fn: self.join_fn.clone(),
            consumers: self.consumers.clone(),
        }
    }
}

impl<L: Data, R: Data, K: Key, U: Data> JoinedRdd<L, R, K, U> {
    pub(crate) fn new<LK, RK, J>(
        location: LocationDetection,
        left: Dia<L>,
        right: Dia<R>,
        left_key: LK,
        right_key: RK,
        join_fn: J,
    ) -> Self
    where
        LK: Fn(&L) -> K + Send + Sync + 'static,
        RK: Fn(&R) -> K + Send + Sync + 'static,
        J: Fn(&L, &R) -> U + Send + Sync + 'static,
    {
        let context = left.get_context();
        let strategy = select_join_strategy::<K>(
            location,
            left.partitioner().as_ref(),
            right.partitioner().as_ref(),
            context.num_workers(),
        );
        log::info!(
            "join of #{} and #{} with location detection {}: {:?}",
            left.get_rdd_id(),
            right.get_rdd_id(),
            location,
            strategy
        );
        if location == LocationDetection::Enabled {
            if let JoinStrategy::Shuffle { .. } = strategy {
                log::warn!(
                    "join #{} / #{} is not co-partitioned, falling back to a shuffle",
                    left.get_rdd_id(),
                    right.get_rdd_id()
                );
            }
        }
        let mut dependencies = Vec::new();
        let target = strategy.target().clone();
        let left = JoinSide::new(
            left,
            Arc::new(left_key),
            strategy.left_in_place(),
            &target,
            &mut dependencies,
        );
        let right = JoinSide::new(
            right,
            Arc::new(right_key),
            strategy.right_in_place(),
            &target,
            &mut dependencies,
        );
        let mut vals = RddVals::new(context, OpKind::InnerJoin(strategy.clone()));
        vals.dependencies = dependencies;
        JoinedRdd {
            vals: Arc::new(vals),
            strategy,
            left,
            right,
            join_fn: Arc::new(join_fn),
            consumers: Arc::new(ConsumeCounter::new()),
        }
    }

    pub fn strategy(&self) -> &JoinStrategy {
        &self.strategy
    }
}

impl<L: Data, R: Data, K: Key, U: Data> RddBase for JoinedRdd<L, R, K, U> {
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

    fn needs_barrier_stage(&self) -> bool {
        !(self.left.is_checked() && self.right.is_checked())
    }

    fn run_barrier_task(&self, split: usize) -> Result<usize> {
        let target = self.strategy.target();
        Ok(self.left.stage(split, target)? + self.right.stage(split, target)?)
    }

    fn complete_barrier(&self, counts: Vec<usize>) -> Result<()> {
        log::debug!(
            "placement of join #{} checked over {} records",
            self.vals.id,
            counts.iter().sum::<usize>()
        );
        let partitions = self.strategy.target().get_num_of_partitions();
        self.left.settle(&self.vals.context, partitions)?;
        self.right.settle(&self.vals.context, partitions)
    }

    // the inputs are read once by the placement check; later reads count against the join
    fn add_consumers(&self, consumers: Consumers) {
        self.consumers.add(consumers);
    }
}

impl<L: Data, R: Data, K: Key, U: Data> Rdd for JoinedRdd<L, R, K, U> {
    type Item = U;
    fn get_rdd(&self) -> Arc<dyn Rdd<Item = Self::Item>> {
        Arc::new(self.clone())
    }

    fn get_rdd_base(&self) -> Arc<dyn RddBase> {
        Arc::new(self.clone()) as Arc<dyn RddBase>
    }

    fn compute(&self, split: usize) -> Result<Box<dyn Iterator<Item = Self::Item>>> {
        let context = &self.vals.context;
        let rdd_id = self.vals.id;
        let left = self.left.groups(context, split, &self.consumers, rdd_id)?;
        let right = self.right.groups(context, split, &self.consumers, rdd_id)?;
        let mut joined = Vec::new();
        for (key, lefts) in left.into_vec() {
            if let Some(rights) = right.get(&key) {
                for l in &lefts {
                    for r in rights {
                        joined.push((self.join_fn)(l, r));
                    }
                }
            }
        }
        Ok(Box::new(joined.into_iter()))
    }
}
