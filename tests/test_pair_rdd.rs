use std::sync::Arc;

use dataflow_rank::*;
use once_cell::sync::Lazy;

static CONTEXT: Lazy<Arc<Context>> = Lazy::new(|| {
    Context::with_config(Configuration {
        num_workers: 4,
        ..Configuration::default()
    })
    .unwrap()
});

fn words() -> Vec<(String, u32)> {
    "the quick brown fox jumps over the lazy dog the end"
        .split(' ')
        .map(|w| (w.to_string(), 1))
        .collect()
}

#[test]
fn test_reduce_pair() -> Result<()> {
    let sc = CONTEXT.clone();
    let counts = sc.parallelize(words()).reduce_pair(|a, b| a + b);
    assert_eq!(counts.get_op_kind(), OpKind::ReducePair);
    assert_eq!(counts.partitioner(), Some(Partitioner::hash::<String>(4)));

    let mut res = counts.collect()?;
    res.sort();
    assert_eq!(res.len(), 9);
    assert!(res.contains(&("the".to_string(), 3)));
    assert!(res.contains(&("fox".to_string(), 1)));
    Ok(())
}

#[test]
fn test_reduce_pair_places_keys_by_partitioner() -> Result<()> {
    let sc = CONTEXT.clone();
    let pairs: Vec<(usize, f64)> = (0..40).map(|i| (i % 10, 1.0)).collect();
    let by_index = Partitioner::index_range(10, 4);
    let summed = sc
        .parallelize(pairs)
        .reduce_pair_using_partitioner(|a, b| a + b, by_index.clone());
    assert_eq!(summed.partitioner(), Some(by_index.clone()));

    let placed = summed
        .map_partitions_with_index(|split, iter| {
            Box::new(iter.map(move |(k, v)| (split, k, v)))
                as Box<dyn Iterator<Item = (usize, usize, f64)>>
        })
        .collect()?;
    assert_eq!(placed.len(), 10);
    for (split, key, value) in placed {
        assert_eq!(by_index.get_partition(&key)?, split);
        assert_eq!(value, 4.0);
    }
    Ok(())
}

#[test]
fn test_absent_keys_stay_absent() -> Result<()> {
    let sc = CONTEXT.clone();
    let res = sc
        .parallelize(vec![(7usize, 1u32), (3, 2), (7, 5)])
        .reduce_pair_using_partitioner(|a, b| a + b, Partitioner::index_range(10, 4))
        .collect()?;
    assert_eq!(res, vec![(3, 2), (7, 6)]);
    Ok(())
}

#[test]
fn test_key_outside_universe() {
    let sc = CONTEXT.clone();
    let res = sc
        .parallelize(vec![(3usize, 1u32), (12, 1)])
        .reduce_pair_using_partitioner(|a, b| a + b, Partitioner::index_range(10, 4))
        .collect();
    assert!(matches!(
        res,
        Err(Error::KeyRange {
            key: 12,
            universe: 10
        })
    ));
}

#[test]
fn test_map_values() -> Result<()> {
    let sc = CONTEXT.clone();
    let counts = sc.parallelize(words()).reduce_pair(|a, b| a + b);
    let doubled = counts.map_values(|c| c * 2);
    assert_eq!(doubled.partitioner(), counts.partitioner());
    let mut res = doubled.collect()?;
    res.sort();
    assert_eq!(res[0], ("brown".to_string(), 2));
    assert!(res.contains(&("the".to_string(), 6)));
    Ok(())
}

#[test]
fn test_partition_by() -> Result<()> {
    let sc = CONTEXT.clone();
    let partitioner = Partitioner::hash::<u64>(4);
    let pairs: Vec<(u64, char)> = vec![(1, 'a'), (2, 'b'), (1, 'c'), (9, 'd'), (2, 'e')];
    let moved = sc.parallelize(pairs).partition_by(partitioner.clone());
    assert_eq!(moved.partitioner(), Some(partitioner.clone()));

    let placed = moved
        .map_partitions_with_index(|split, iter| {
            Box::new(iter.map(move |pair| (split, pair)))
                as Box<dyn Iterator<Item = (usize, (u64, char))>>
        })
        .collect()?;
    assert_eq!(placed.len(), 5);
    for (split, (key, _)) in &placed {
        assert_eq!(partitioner.get_partition(key)?, *split);
    }
    // values of one key keep their arrival order
    let ones: Vec<char> = placed
        .iter()
        .filter(|(_, (k, _))| *k == 1)
        .map(|(_, (_, v))| *v)
        .collect();
    assert_eq!(ones, vec!['a', 'c']);
    Ok(())
}

#[test]
fn test_combine_by_key() -> Result<()> {
    let sc = CONTEXT.clone();
    let averages = sc
        .parallelize(
            vec![("a", 1.0), ("b", 4.0), ("a", 3.0), ("b", 2.0), ("b", 3.0)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
        .combine_by_key(
            Aggregator::<f64, (f64, usize)>::new(
                Box::new(|v: f64| (v, 1usize)),
                Box::new(|(s, n): (f64, usize), v: f64| (s + v, n + 1)),
                Box::new(|(s1, n1): (f64, usize), (s2, n2): (f64, usize)| (s1 + s2, n1 + n2)),
            ),
            Partitioner::hash::<String>(4),
            OpKind::ReducePair,
        )
        .map_values(|(sum, n)| sum / n as f64);
    let mut res = averages.collect()?;
    res.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(res, vec![("a".to_string(), 2.0), ("b".to_string(), 3.0)]);
    Ok(())
}

#[test]
fn test_shuffle_traffic_is_counted() -> Result<()> {
    let sc = Context::with_config(Configuration {
        num_workers: 3,
        ..Configuration::default()
    })?;
    assert_eq!(sc.traffic().total_bytes(), 0);
    let pairs: Vec<(u32, u32)> = (0..300).map(|i| (i, i)).collect();
    sc.parallelize(pairs).reduce_pair(|a, b| a + b).execute()?;
    let traffic = sc.traffic();
    assert!(traffic.remote_bytes > 0);
    assert!(traffic.local_bytes > 0);
    assert_eq!(traffic.total_bytes(), traffic.local_bytes + traffic.remote_bytes);
    Ok(())
}
