use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use crate::serializable_traits::Data;

// Aggregator for shuffle tasks.
pub struct Aggregator<V: Data, C: Data> {
    pub create_combiner: Box<dyn Fn(V) -> C + Send + Sync>,
    pub merge_value: Box<dyn Fn(C, V) -> C + Send + Sync>,
    pub merge_combiners: Box<dyn Fn(C, C) -> C + Send + Sync>,
}

impl<V: Data, C: Data> Aggregator<V, C> {
    pub fn new(
        create_combiner: Box<dyn Fn(V) -> C + Send + Sync>,
        merge_value: Box<dyn Fn(C, V) -> C + Send + Sync>,
        merge_combiners: Box<dyn Fn(C, C) -> C + Send + Sync>,
    ) -> Self {
        Aggregator {
            create_combiner,
            merge_value,
            merge_combiners,
        }
    }
}

impl<V: Data> Aggregator<V, V> {
    /// Map-side combining fold: values are reduced with `combine` before and after the shuffle.
    pub fn reducing<F>(combine: F) -> Self
    where
        F: Fn(V, V) -> V + Send + Sync + 'static,
    {
        let combine = Arc::new(combine);
        let merge = combine.clone();
        Aggregator {
            create_combiner: Box::new(|v| v),
            merge_value: Box::new(move |c, v| combine(c, v)),
            merge_combiners: Box::new(move |c1, c2| merge(c1, c2)),
        }
    }
}

impl<V: Data> Default for Aggregator<V, Vec<V>> {
    // Keeps values in arrival order: map partitions are merged in partition order.
    fn default() -> Self {
        let merge_value = Box::new(|mut buf: Vec<V>, v: V| {
            buf.push(v);
            buf
        });
        let create_combiner = Box::new(|v: V| vec![v]);
        let merge_combiners = Box::new(|mut b1: Vec<V>, mut b2: Vec<V>| {
            b1.append(&mut b2);
            b1
        });
        Aggregator {
            create_combiner,
            merge_value,
            merge_combiners,
        }
    }
}

/// Per-key combiners kept in first-appearance order of their keys.
pub(crate) struct OrderedCombiners<K, C> {
    index: HashMap<K, usize>,
    entries: Vec<(K, Option<C>)>,
}

impl<K: Eq + Hash + Clone, C> OrderedCombiners<K, C> {
    pub fn new() -> Self {
        OrderedCombiners {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    pub fn combine<V>(
        &mut self,
        key: K,
        value: V,
        create: impl FnOnce(V) -> C,
        merge: impl FnOnce(C, V) -> C,
    ) {
        match self.index.get(&key) {
            Some(&i) => {
                let slot = &mut self.entries[i].1;
                if let Some(old) = slot.take() {
                    *slot = Some(merge(old, value));
                }
            }
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, Some(create(value))));
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<&C> {
        self.index
            .get(key)
            .and_then(|&i| self.entries[i].1.as_ref())
    }

    pub fn into_vec(self) -> Vec<(K, C)> {
        self.entries
            .into_iter()
            .filter_map(|(k, c)| c.map(|c| (k, c)))
            .collect()
    }
}
