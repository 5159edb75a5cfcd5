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

#[test]
fn test_group_by_key() -> Result<()> {
    let sc = CONTEXT.clone();
    let vec = vec![
        ("x".to_string(), 1),
        ("y".to_string(), 1),
        ("x".to_string(), 2),
        ("x".to_string(), 3),
        ("y".to_string(), 2),
        ("x".to_string(), 4),
        ("y".to_string(), 3),
        ("y".to_string(), 4),
    ];
    let r = sc.parallelize(vec);
    let g = r.group_by_key(
        |(k, _): &(String, i32)| k.clone(),
        |k: &String, items: Box<dyn Iterator<Item = (String, i32)>>| {
            (k.clone(), items.map(|(_, v)| v).collect::<Vec<_>>())
        },
    );
    assert_eq!(g.partitioner(), Some(Partitioner::hash::<String>(4)));
    let mut res = g.collect()?;
    res.sort();

    // groups keep arrival order
    let expected = vec![
        ("x".to_string(), vec![1, 2, 3, 4]),
        ("y".to_string(), vec![1, 2, 3, 4]),
    ];
    assert_eq!(expected, res);
    Ok(())
}

#[test]
fn test_group_to_index() -> Result<()> {
    let sc = CONTEXT.clone();
    let edges = sc.parallelize(vec![(0usize, 5usize), (2, 1), (0, 3), (5, 0), (2, 2), (0, 4)]);
    let adjacency = edges.group_to_index(
        |(src, _): &(usize, usize)| *src,
        |links: Box<dyn Iterator<Item = (usize, usize)>>, _| {
            links.map(|(_, tgt)| tgt).collect::<Vec<_>>()
        },
        7,
        Vec::new(),
    );
    assert_eq!(adjacency.partitioner(), Some(Partitioner::index_range(7, 4)));
    assert_eq!(adjacency.get_op_kind(), OpKind::GroupToIndex);
    assert_eq!(
        adjacency.collect()?,
        vec![
            vec![5, 3, 4],
            vec![],
            vec![1, 2],
            vec![],
            vec![],
            vec![0],
            vec![],
        ]
    );
    Ok(())
}

#[test]
fn test_group_to_index_passes_index() -> Result<()> {
    let sc = CONTEXT.clone();
    let labels = sc
        .parallelize(vec![3usize, 1, 3])
        .group_to_index(
            |i: &usize| *i,
            |items: Box<dyn Iterator<Item = usize>>, index| format!("{}x{}", index, items.count()),
            5,
            "none".to_string(),
        )
        .collect()?;
    assert_eq!(labels, vec!["none", "1x1", "none", "3x2", "none"]);
    Ok(())
}

#[test]
fn test_reduce_to_index_is_dense() -> Result<()> {
    let sc = CONTEXT.clone();
    let contributions = sc.parallelize(vec![(8usize, 1.5), (1, 0.25), (8, 0.5), (3, 1.0)]);
    let reduced = contributions.reduce_to_index(
        |(page, _): &(usize, f64)| *page,
        |(page, a), (_, b)| (page, a + b),
        10,
        (0, 0.0),
    );
    assert_eq!(reduced.get_op_kind(), OpKind::ReduceToIndex);
    let res = reduced.collect()?;
    assert_eq!(res.len(), 10);
    let ranks: Vec<f64> = res.iter().map(|(_, r)| *r).collect();
    assert_eq!(
        ranks,
        vec![0.0, 0.25, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 2.0, 0.0]
    );
    Ok(())
}

#[test]
fn test_reduce_to_index_partitions_by_range() -> Result<()> {
    let sc = CONTEXT.clone();
    let reduced = sc
        .parallelize((0..100usize).rev().collect::<Vec<_>>())
        .reduce_to_index(|i: &usize| i % 10, |a, _| a, 10, usize::MAX);
    let per_partition = reduced
        .map_partitions(|iter| {
            Box::new(std::iter::once(iter.count())) as Box<dyn Iterator<Item = usize>>
        })
        .collect()?;
    // partition p holds indices [p * 10 / 4, (p + 1) * 10 / 4)
    assert_eq!(per_partition, vec![2, 3, 2, 3]);
    Ok(())
}

#[test]
fn test_reduce_to_index_key_range() {
    let sc = CONTEXT.clone();
    let res = sc
        .parallelize(vec![1usize, 4, 2])
        .reduce_to_index(|i: &usize| *i, |a, b| a + b, 4, 0)
        .collect();
    assert!(matches!(
        res,
        Err(Error::KeyRange {
            key: 4,
            universe: 4
        })
    ));
}

#[test]
fn test_empty_universe() -> Result<()> {
    let sc = CONTEXT.clone();
    let res = sc
        .parallelize(Vec::<usize>::new())
        .reduce_to_index(|i: &usize| *i, |a, b| a + b, 0, 0)
        .collect()?;
    assert!(res.is_empty());
    Ok(())
}
