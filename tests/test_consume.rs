use std::sync::Arc;

use dataflow_rank::*;

fn consuming_context() -> Result<Arc<Context>> {
    Context::with_config(Configuration {
        num_workers: 3,
        enable_consume: true,
        ..Configuration::default()
    })
}

#[test]
fn test_second_read_fails() -> Result<()> {
    let sc = consuming_context()?;
    let numbers = sc.parallelize((0..30).collect::<Vec<u32>>());
    assert_eq!(numbers.count()?, 30);
    match numbers.count() {
        Err(Error::UseAfterConsume { rdd_id }) => assert_eq!(rdd_id, numbers.get_rdd_id()),
        other => panic!("expected UseAfterConsume, got {:?}", other),
    }
    assert_eq!(sc.freed_partitions(), 3);
    Ok(())
}

#[test]
fn test_keep_allows_more_reads() -> Result<()> {
    let sc = consuming_context()?;
    let numbers = sc.parallelize((0..30).collect::<Vec<u32>>());
    numbers.keep_by(2);
    assert_eq!(numbers.sum()?, 435);
    assert_eq!(numbers.max()?, Some(29));
    assert_eq!(sc.freed_partitions(), 0);
    assert_eq!(numbers.min()?, Some(0));
    assert_eq!(sc.freed_partitions(), 3);
    assert!(numbers.count().is_err());
    Ok(())
}

#[test]
fn test_keep_forwards_to_storage() -> Result<()> {
    let sc = consuming_context()?;
    let numbers = sc.parallelize((1..=9).collect::<Vec<u64>>());
    let doubled = numbers.map(|x| x * 2);
    // no storage of its own, so the parallelized source is kept
    doubled.keep();
    assert_eq!(doubled.sum()?, 90);
    assert_eq!(numbers.sum()?, 45);
    assert!(doubled.collect().is_err());
    Ok(())
}

#[test]
fn test_keep_forever() -> Result<()> {
    let sc = consuming_context()?;
    let cached = sc.generate(12, |i| i as f64).cache();
    cached.keep_forever();
    for _ in 0..5 {
        assert_eq!(cached.sum()?, 66.0);
    }
    assert_eq!(sc.freed_partitions(), 0);
    Ok(())
}

#[test]
fn test_materializing_is_not_a_read() -> Result<()> {
    let sc = consuming_context()?;
    let cached = sc.generate(6, |i| i).map(|i| i + 1).cache();
    cached.execute()?;
    cached.execute()?;
    assert!(cached.is_materialized());
    assert_eq!(cached.collect()?, vec![1, 2, 3, 4, 5, 6]);
    assert!(matches!(
        cached.collect(),
        Err(Error::UseAfterConsume { .. })
    ));
    Ok(())
}

#[test]
fn test_size_future_counts_as_a_read() -> Result<()> {
    let sc = consuming_context()?;
    let cached = sc.generate(10, |i| i).cache();
    cached.keep();
    let size = cached.size_future();
    assert_eq!(cached.sum()?, 45);
    assert_eq!(size.get()?, 10);
    assert!(cached.sum().is_err());
    Ok(())
}

fn sparse_ranks(sc: &Arc<Context>) -> Dia<(usize, f64)> {
    sc.parallelize(vec![(1, 1.0), (3, 2.0)])
        .reduce_to_index(|r| r.0, |a, b| (a.0, a.1 + b.1), 4, (0, 0.0))
}

#[test]
fn test_kept_shuffle_output_is_read_twice() -> Result<()> {
    let sc = consuming_context()?;
    let ranks = sparse_ranks(&sc);
    // numbering counts its input before reading it
    ranks.keep();
    let numbered = ranks.zip_with_index(|r, i| (i, r.1)).collect()?;
    assert_eq!(numbered, vec![(0, 0.0), (1, 1.0), (2, 0.0), (3, 2.0)]);
    match ranks.count() {
        Err(Error::UseAfterConsume { rdd_id }) => assert_eq!(rdd_id, ranks.get_rdd_id()),
        other => panic!("expected UseAfterConsume, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_shuffle_output_is_read_once() -> Result<()> {
    let sc = consuming_context()?;
    let ranks = sparse_ranks(&sc);
    match ranks.zip_with_index(|r, i| (i, r.1)).collect() {
        Err(Error::UseAfterConsume { rdd_id }) => assert_eq!(rdd_id, ranks.get_rdd_id()),
        other => panic!("expected UseAfterConsume, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_keep_reaches_grouped_output() -> Result<()> {
    let sc = consuming_context()?;
    let groups = sc
        .parallelize((0..12).collect::<Vec<u32>>())
        .group_by_key(|x| x % 3, |k, items| (*k, items.count()));
    groups.keep();
    assert_eq!(groups.count()?, 3);
    let mut sizes = groups.collect()?;
    sizes.sort();
    assert_eq!(sizes, vec![(0, 4), (1, 4), (2, 4)]);
    assert!(matches!(groups.count(), Err(Error::UseAfterConsume { .. })));
    Ok(())
}

#[test]
fn test_join_reads_its_inputs_once() -> Result<()> {
    let sc = consuming_context()?;
    let left = sc.parallelize((0..6).map(|i| (i, i)).collect::<Vec<(usize, usize)>>());
    let right = sc.generate(6, |i| (i, i * 2));
    let joined = left.inner_join(
        LocationDetection::Enabled,
        &right,
        |l: &(usize, usize)| l.0,
        |r: &(usize, usize)| r.0,
        |l, r| l.1 + r.1,
    );
    joined.keep();
    assert_eq!(joined.sum()?, 45);
    assert_eq!(joined.count()?, 6);
    match joined.count() {
        Err(Error::UseAfterConsume { rdd_id }) => assert_eq!(rdd_id, joined.get_rdd_id()),
        other => panic!("expected UseAfterConsume, got {:?}", other),
    }
    // the join itself was the only reader of its left input
    assert!(left.count().is_err());
    Ok(())
}

#[test]
fn test_consume_is_off_by_default() -> Result<()> {
    let sc = Context::with_config(Configuration {
        num_workers: 2,
        ..Configuration::default()
    })?;
    assert!(!sc.consume_enabled());
    let numbers = sc.parallelize(vec![1, 2, 3]);
    for _ in 0..3 {
        assert_eq!(numbers.count()?, 3);
    }
    sc.enable_consume();
    assert!(sc.consume_enabled());
    Ok(())
}
