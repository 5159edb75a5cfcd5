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

fn join_strategy<T: Data>(dia: &Dia<T>) -> JoinStrategy {
    match dia.get_op_kind() {
        OpKind::InnerJoin(strategy) => strategy,
        other => panic!("not a join: {:?}", other),
    }
}

#[test]
fn test_join() -> Result<()> {
    let sc = CONTEXT.clone();
    let col1 = vec![
        (1, ("A".to_string(), "B".to_string())),
        (2, ("C".to_string(), "D".to_string())),
        (3, ("E".to_string(), "F".to_string())),
        (4, ("G".to_string(), "H".to_string())),
    ];
    let col1 = sc.parallelize(col1);
    let col2 = vec![
        (1, "A1".to_string()),
        (1, "A2".to_string()),
        (2, "B1".to_string()),
        (2, "B2".to_string()),
        (3, "C1".to_string()),
        (3, "C2".to_string()),
        (5, "X".to_string()),
    ];
    let col2 = sc.parallelize(col2);
    let inner_joined_rdd = col2.inner_join(
        LocationDetection::Enabled,
        &col1,
        |l: &(i32, String)| l.0,
        |r: &(i32, (String, String))| r.0,
        |l, r| (l.0, (l.1.clone(), r.1.clone())),
    );
    let mut res = inner_joined_rdd.collect()?;
    res.sort();

    let expected = vec![
        (1, "A1", "A", "B"),
        (1, "A2", "A", "B"),
        (2, "B1", "C", "D"),
        (2, "B2", "C", "D"),
        (3, "C1", "E", "F"),
        (3, "C2", "E", "F"),
    ]
    .iter()
    .map(|tuple| {
        (
            tuple.0,
            (
                tuple.1.to_string(),
                (tuple.2.to_string(), tuple.3.to_string()),
            ),
        )
    })
    .collect::<Vec<_>>();
    assert_eq!(expected, res);
    Ok(())
}

#[test]
fn test_join_emits_cross_product_per_key() -> Result<()> {
    let sc = CONTEXT.clone();
    let left = sc.parallelize(vec![(7u32, 'a'), (7, 'b'), (8, 'c')]);
    let right = sc.parallelize(vec![(7u32, 1), (9, 2), (7, 3), (7, 4)]);
    let joined = left
        .inner_join(
            LocationDetection::Disabled,
            &right,
            |l: &(u32, char)| l.0,
            |r: &(u32, i32)| r.0,
            |l, r| (l.1, r.1),
        )
        .collect()?;
    // left records in arrival order, each paired with the right records in arrival order
    assert_eq!(
        joined,
        vec![('a', 1), ('a', 3), ('a', 4), ('b', 1), ('b', 3), ('b', 4)]
    );
    Ok(())
}

#[test]
fn test_index_aligned_join_is_local() -> Result<()> {
    // own context, so no other test adds shuffle traffic
    let sc = Context::with_config(Configuration {
        num_workers: 4,
        ..Configuration::default()
    })?;
    let links = sc.generate(20, |i| (i, vec![(i + 1) % 20])).cache();
    let ranks = sc.generate(20, |i| (i, i as f64)).collapse();
    let joined = links.inner_join(
        LocationDetection::Enabled,
        &ranks,
        |l: &(usize, Vec<usize>)| l.0,
        |r: &(usize, f64)| r.0,
        |l, r| (l.1[0], r.1),
    );
    assert_eq!(
        join_strategy(&joined),
        JoinStrategy::Local {
            partitioner: Partitioner::index_range(20, 4)
        }
    );
    assert_eq!(joined.partitioner(), None);

    let before = sc.traffic();
    let mut res = joined.collect()?;
    assert_eq!(sc.traffic(), before);
    res.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(res.len(), 20);
    assert_eq!(res[0], (0, 19.0));
    assert_eq!(res[5], (5, 4.0));
    Ok(())
}

#[test]
fn test_detection_does_not_change_the_result() -> Result<()> {
    let sc = CONTEXT.clone();
    let left = sc.generate(50, |i| (i, i % 7));
    let right = sc
        .parallelize((0..120).map(|i| (i % 40, i)).collect::<Vec<(usize, usize)>>())
        .reduce_pair_using_partitioner(|a, b| a + b, Partitioner::index_range(50, 4))
        .map_values(|v| v * 2);
    let hashed_right = sc
        .parallelize((0..120).map(|i| (i % 40, i)).collect::<Vec<(usize, usize)>>())
        .reduce_pair(|a, b| a + b)
        .map_values(|v| v * 2);

    let join = |location: LocationDetection, right: &Dia<(usize, usize)>| {
        left.inner_join(
            location,
            right,
            |l: &(usize, usize)| l.0,
            |r: &(usize, usize)| r.0,
            |l, r| (l.0, l.1, r.1),
        )
    };

    let local = join(LocationDetection::Enabled, &right);
    let mixed = join(LocationDetection::Enabled, &hashed_right);
    let shuffled = join(LocationDetection::Disabled, &right);
    assert!(matches!(join_strategy(&local), JoinStrategy::Local { .. }));
    assert_eq!(
        join_strategy(&mixed),
        JoinStrategy::Shuffle {
            target: Partitioner::index_range(50, 4),
            left_in_place: true,
            right_in_place: false,
        }
    );
    assert_eq!(
        join_strategy(&shuffled),
        JoinStrategy::Shuffle {
            target: Partitioner::hash::<usize>(4),
            left_in_place: false,
            right_in_place: false,
        }
    );

    let mut expected = shuffled.collect()?;
    expected.sort();
    // keys 40..50 only exist on the left side
    assert_eq!(expected.len(), 40);
    for joined in &[local, mixed] {
        let mut res = joined.collect()?;
        res.sort();
        assert_eq!(res, expected);
    }
    Ok(())
}

fn sorted<T: Ord>(mut records: Vec<T>) -> Vec<T> {
    records.sort();
    records
}

#[test]
fn test_misplaced_in_place_side_is_shuffled() -> Result<()> {
    // own context, to see the shuffle the misplaced side needs
    let sc = Context::with_config(Configuration {
        num_workers: 4,
        ..Configuration::default()
    })?;
    // tagged as index placed, but every key sits in the mirrored position
    let mislabeled = sc.generate(8, |i| (7 - i, i));
    let ranks = sc.generate(8, |i| (i, i * 10));
    let join = |location| {
        mislabeled.inner_join(
            location,
            &ranks,
            |l: &(usize, usize)| l.0,
            |r: &(usize, usize)| r.0,
            |l, r| (l.1, r.1),
        )
    };
    let detected = join(LocationDetection::Enabled);
    assert!(matches!(join_strategy(&detected), JoinStrategy::Local { .. }));

    let before = sc.traffic();
    let res = sorted(detected.collect()?);
    assert!(sc.traffic().remote_bytes > before.remote_bytes);
    assert_eq!(res, sorted(join(LocationDetection::Disabled).collect()?));
    assert_eq!(res, (0..8).map(|i| (i, (7 - i) * 10)).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_neutral_records_off_their_index_still_join() -> Result<()> {
    let sc = CONTEXT.clone();
    // indices without input get (0, 0.0), whose key is not their own index
    let reduced = sc
        .parallelize(vec![(1usize, 1.0f64), (3, 2.0), (3, 0.5)])
        .reduce_to_index(|r| r.0, |a, b| (a.0, a.1 + b.1), 8, (0, 0.0));
    let pages = sc.generate(8, |i| (i, i));
    let join = |location| {
        reduced
            .inner_join(
                location,
                &pages,
                |l: &(usize, f64)| l.0,
                |r: &(usize, usize)| r.0,
                |l, r| (r.1, l.1),
            )
            .collect()
    };
    let mut detected = join(LocationDetection::Enabled)?;
    let mut shuffled = join(LocationDetection::Disabled)?;
    detected.sort_by(|a, b| a.partial_cmp(b).unwrap());
    shuffled.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(detected, shuffled);
    // six neutral records match page 0, plus pages 1 and 3
    assert_eq!(detected.len(), 8);
    assert_eq!(detected[7], (3, 2.5));
    Ok(())
}

#[test]
fn test_keys_outside_the_index_universe_meet() -> Result<()> {
    let sc = CONTEXT.clone();
    // both sides tagged with a universe of 10, keys run past it
    let left = sc.generate(10, |i| (i + 5, i));
    let right = sc.generate(10, |i| (i + 3, i * 100));
    let join = |location| {
        left.inner_join(
            location,
            &right,
            |l: &(usize, usize)| l.0,
            |r: &(usize, usize)| r.0,
            |l, r| (l.0, l.1, r.1),
        )
        .collect()
    };
    let detected = sorted(join(LocationDetection::Enabled)?);
    assert_eq!(detected, sorted(join(LocationDetection::Disabled)?));
    // keys 5..13 are on both sides
    assert_eq!(detected.len(), 8);
    assert_eq!(detected[7], (12, 7, 900));
    Ok(())
}

#[test]
fn test_join_with_empty_side() -> Result<()> {
    let sc = CONTEXT.clone();
    let left = sc.parallelize(vec![(1u8, 1u8), (2, 2)]);
    let right = sc.parallelize(Vec::<(u8, u8)>::new());
    let joined = left.inner_join(
        LocationDetection::Enabled,
        &right,
        |l: &(u8, u8)| l.0,
        |r: &(u8, u8)| r.0,
        |l, r| l.1 + r.1,
    );
    assert_eq!(joined.count()?, 0);
    Ok(())
}
