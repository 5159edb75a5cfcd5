use std::fs::{create_dir_all, File};
use std::io::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
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

fn partitions<T: Data>(dia: &Dia<T>) -> Result<Vec<Vec<T>>> {
    dia.map_partitions(|iter| {
        Box::new(std::iter::once(iter.collect::<Vec<T>>())) as Box<dyn Iterator<Item = Vec<T>>>
    })
    .collect()
}

#[test]
fn test_parallelize() -> Result<()> {
    let sc = CONTEXT.clone();
    let col = sc.parallelize((0..10).collect::<Vec<_>>());
    let vec_iter = col.map(|i| (0..i).collect::<Vec<_>>());
    let res = vec_iter.collect()?;
    let expected = (0..10)
        .map(|i| (0..i).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    assert_eq!(expected, res);
    Ok(())
}

#[test]
fn test_parallelize_splits_contiguously() -> Result<()> {
    let sc = CONTEXT.clone();
    let rdd = sc.parallelize((0..10).collect::<Vec<u32>>());
    assert_eq!(
        partitions(&rdd)?,
        vec![vec![0, 1], vec![2, 3, 4], vec![5, 6], vec![7, 8, 9]]
    );
    assert_eq!(rdd.partitioner(), None);
    Ok(())
}

#[test]
fn test_map_partitions() -> Result<()> {
    let sc = CONTEXT.clone();
    let rdd = sc.parallelize(vec![1, 2, 3, 4, 5, 6, 7, 8]);
    let partition_sums = rdd
        .map_partitions(|iter: Box<dyn Iterator<Item = i64>>| {
            Box::new(std::iter::once(iter.sum::<i64>())) as Box<dyn Iterator<Item = i64>>
        })
        .collect()?;
    assert_eq!(partition_sums, vec![3, 7, 11, 15]);
    Ok(())
}

#[test]
fn test_map_partitions_with_index() -> Result<()> {
    let sc = CONTEXT.clone();
    let tagged = sc
        .parallelize(vec!['a', 'b', 'c', 'd'])
        .map_partitions_with_index(|index, iter| {
            Box::new(iter.map(move |c| format!("{}{}", index, c)))
                as Box<dyn Iterator<Item = String>>
        })
        .collect()?;
    assert_eq!(tagged, vec!["0a", "1b", "2c", "3d"]);
    Ok(())
}

#[test]
fn test_flat_map() -> Result<()> {
    let sc = CONTEXT.clone();
    let words = sc
        .parallelize(vec!["a b".to_string(), String::new(), "c d e".to_string()])
        .flat_map(|line: String| {
            Box::new(
                line.split_whitespace()
                    .map(String::from)
                    .collect::<Vec<_>>()
                    .into_iter(),
            ) as Box<dyn Iterator<Item = String>>
        })
        .collect()?;
    assert_eq!(words, vec!["a", "b", "c", "d", "e"]);
    Ok(())
}

#[test]
fn test_try_map_fails_the_job() {
    let sc = CONTEXT.clone();
    let res = sc
        .parallelize(vec!["1 2".to_string(), "3 x".to_string()])
        .try_map(|line: String| page_rank::parse_edge(&line))
        .collect();
    assert!(matches!(res, Err(Error::InputFormat { .. })));
}

#[test]
fn test_fold() {
    let sc = CONTEXT.clone();
    let rdd = sc.parallelize((-1000..1000).collect::<Vec<_>>());
    let sum = rdd.fold(0, |c, x| c + x).unwrap();
    assert_eq!(sum, -1000)
}

#[test]
fn test_fold_with_modifying_initial_value() {
    let sc = CONTEXT.clone();
    let rdd = sc
        .parallelize((-1000..1000).collect::<Vec<i32>>())
        .map(|x| vec![x]);
    let f = |mut c: Vec<i32>, x: Vec<i32>| {
        c[0] += x[0];
        c
    };
    let sum = rdd.fold(vec![0], f).unwrap();
    assert_eq!(sum[0], -1000)
}

#[test]
fn test_reduce() -> Result<()> {
    let sc = CONTEXT.clone();
    let rdd = sc.parallelize((1..=10).collect::<Vec<u64>>());
    assert_eq!(rdd.reduce(|a, b| a * b)?, Some(3_628_800));
    // partitions without records do not take part
    let rdd = sc.parallelize(vec![5u64]);
    assert_eq!(rdd.reduce(|a, b| a + b)?, Some(5));
    let empty = sc.parallelize(Vec::<u64>::new());
    assert_eq!(empty.reduce(|a, b| a + b)?, None);
    Ok(())
}

#[test]
fn test_sum_max_min() -> Result<()> {
    let sc = CONTEXT.clone();
    let rdd = sc.parallelize(vec![3.5, -1.0, 7.25, 0.0]);
    assert_eq!(rdd.sum()?, 9.75);
    assert_eq!(rdd.max()?, Some(7.25));
    assert_eq!(rdd.min()?, Some(-1.0));
    let empty = sc.parallelize(Vec::<usize>::new());
    assert_eq!(empty.max()?, None);
    assert_eq!(empty.sum()?, 0);
    Ok(())
}

#[test]
fn test_count_and_size() -> Result<()> {
    let sc = CONTEXT.clone();
    let rdd = sc.parallelize((0..123).collect::<Vec<_>>());
    assert_eq!(rdd.count()?, 123);
    assert_eq!(rdd.size()?, 123);
    Ok(())
}

#[test]
fn test_size_future() -> Result<()> {
    let sc = CONTEXT.clone();
    let rdd = sc.parallelize((0..50).collect::<Vec<u32>>());
    let evens = rdd.flat_map(|x| {
        Box::new(Some(x).filter(|x| x % 2 == 0).into_iter()) as Box<dyn Iterator<Item = u32>>
    });
    let size = evens.size_future();
    // the deferred count runs before this job
    assert_eq!(rdd.sum()?, 1225);
    assert_eq!(size.get()?, 25);
    // read without another job in between
    let direct = rdd.size_future();
    assert_eq!(direct.get()?, 50);
    Ok(())
}

#[test]
fn test_generate() -> Result<()> {
    let sc = CONTEXT.clone();
    let squares = sc.generate(10, |i| i * i);
    assert_eq!(
        squares.partitioner(),
        Some(Partitioner::index_range(10, 4))
    );
    assert_eq!(
        partitions(&squares)?,
        vec![vec![0, 1], vec![4, 9, 16], vec![25, 36], vec![49, 64, 81]]
    );
    Ok(())
}

#[test]
fn test_generate_fewer_records_than_workers() -> Result<()> {
    let sc = CONTEXT.clone();
    let few = sc.generate(2, |i| i);
    assert_eq!(
        partitions(&few)?,
        vec![vec![], vec![0], vec![], vec![1]]
    );
    assert_eq!(sc.generate(0, |i| i).count()?, 0);
    Ok(())
}

#[test]
fn test_operators_keep_or_clear_partitioning() {
    let sc = CONTEXT.clone();
    let generated = sc.generate(8, |i| (i, i as f64));
    let tag = Some(Partitioner::index_range(8, 4));
    assert_eq!(generated.collapse().partitioner(), tag);
    assert_eq!(generated.cache().partitioner(), tag);
    assert_eq!(generated.map_values(|v| v * 2.0).partitioner(), tag);
    assert_eq!(generated.map(|p| p).partitioner(), None);
    assert_eq!(generated.map(|p| p).get_op_kind(), OpKind::Map);
    assert_eq!(generated.collapse().get_op_kind(), OpKind::Collapse);
}

#[test]
fn test_zip() -> Result<()> {
    let sc = CONTEXT.clone();
    let left = sc.parallelize((0..10).collect::<Vec<usize>>());
    let right = sc.generate(10, |i| format!("r{}", i));
    let zipped = left.zip(&right).collect()?;
    assert_eq!(zipped.len(), 10);
    assert!(zipped.iter().all(|(l, r)| r == &format!("r{}", l)));

    let summed = left.zip_with(&left.map(|x| x * 10), |a, b| a + b).collect()?;
    assert_eq!(summed, (0..10).map(|x| x * 11).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_zip_misaligned() {
    let sc = CONTEXT.clone();
    let left = sc.parallelize((0..8).collect::<Vec<usize>>());
    let right = sc.generate(10, |i| i);
    match left.zip(&right).collect() {
        Err(Error::ZipMisaligned {
            split, left, right, ..
        }) => {
            assert_eq!(split, 1);
            assert_eq!((left, right), (2, 3));
        }
        other => panic!("expected ZipMisaligned, got {:?}", other),
    }
}

#[test]
fn test_zip_with_index() -> Result<()> {
    let sc = CONTEXT.clone();
    let letters = sc.parallelize(vec!['a', 'b', 'c', 'd', 'e', 'f', 'g']);
    let numbered = letters
        .zip_with_index(|c, i| format!("{}={}", i, c))
        .collect()?;
    assert_eq!(numbered, vec!["0=a", "1=b", "2=c", "3=d", "4=e", "5=f", "6=g"]);
    assert_eq!(
        letters.zip_with_index(|c, i| (i, c)).get_op_kind(),
        OpKind::ZipWithIndex
    );
    Ok(())
}

static COMPUTED: AtomicUsize = AtomicUsize::new(0);

#[test]
fn test_cache_computes_once() -> Result<()> {
    let sc = CONTEXT.clone();
    let cached = sc
        .parallelize((0..20).collect::<Vec<u32>>())
        .map(|x| {
            COMPUTED.fetch_add(1, Ordering::SeqCst);
            x + 1
        })
        .cache();
    assert!(!cached.is_materialized());
    assert_eq!(cached.sum()?, 210);
    assert!(cached.is_materialized());
    assert_eq!(cached.count()?, 20);
    cached.execute()?;
    assert_eq!(COMPUTED.load(Ordering::SeqCst), 20);
    Ok(())
}

#[test]
fn test_execute_runs_the_dag() -> Result<()> {
    let sc = CONTEXT.clone();
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = ran.clone();
    sc.parallelize((0..9).collect::<Vec<u8>>())
        .map(move |x| {
            counter.fetch_add(1, Ordering::SeqCst);
            x
        })
        .execute()?;
    assert_eq!(ran.load(Ordering::SeqCst), 9);
    Ok(())
}

#[test]
fn test_read_lines() -> Result<()> {
    let sc = CONTEXT.clone();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    create_dir_all(&input).unwrap();
    let mut expected = Vec::new();
    for file in 0..3 {
        let mut f = File::create(input.join(format!("part-{}", file))).unwrap();
        for line in 0..25 {
            let text = format!("file {} line {}", file, line);
            writeln!(f, "{}", text).unwrap();
            expected.push(text);
        }
    }

    let lines = sc.read_lines(&[&input])?;
    assert_eq!(lines.get_op_kind(), OpKind::ReadLines);
    assert_eq!(lines.collect()?, expected);

    let single = sc.read_lines(&[input.join("part-1")])?.count()?;
    assert_eq!(single, 25);
    Ok(())
}

#[test]
fn test_read_missing_input() {
    let sc = CONTEXT.clone();
    let res = sc.read_lines(&["/does/not/exist/edges.txt"]);
    assert!(matches!(res, Err(Error::InputRead { .. })));
}

#[test]
fn test_write_lines() -> Result<()> {
    let sc = CONTEXT.clone();
    let dir = tempfile::tempdir().unwrap();
    let pattern = dir.path().join("out/ranks-@@@").to_string_lossy().into_owned();
    let paths = sc
        .parallelize((0..6).collect::<Vec<u32>>())
        .map(|x| format!("line {}", x))
        .write_lines(&pattern)?;
    assert_eq!(paths.len(), 4);
    assert_eq!(paths[0], dir.path().join("out/ranks-000"));
    assert_eq!(paths[3], dir.path().join("out/ranks-003"));

    let mut content = String::new();
    for path in &paths {
        File::open(path).unwrap().read_to_string(&mut content).unwrap();
    }
    assert_eq!(content, "line 0\nline 1\nline 2\nline 3\nline 4\nline 5\n");
    Ok(())
}

#[test]
fn test_print() -> Result<()> {
    let sc = CONTEXT.clone();
    sc.parallelize(vec![1, 2, 3]).print("numbers")
}

#[test]
fn test_task_panic_fails_the_job() {
    let sc = CONTEXT.clone();
    let res = sc
        .parallelize(vec![1, 2, 3, 4])
        .map(|x: i32| {
            if x == 3 {
                panic!("bad record");
            }
            x
        })
        .collect();
    assert!(matches!(res, Err(Error::TaskPanicked { .. })));
}
