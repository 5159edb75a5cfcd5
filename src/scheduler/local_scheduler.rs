use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::rdd::{Rdd, RddBase};
use crate::scheduler::TaskContext;
use crate::serializable_traits::Data;
use parking_lot::Mutex;
use threadpool::ThreadPool;

/// Runs every stage as one task per partition on a fixed pool of worker threads.
///
/// A stage is a barrier: `run_stage` returns only once all of its tasks have reported.
pub(crate) struct LocalScheduler {
    num_workers: usize,
    pool: Mutex<ThreadPool>,
    next_job_id: AtomicUsize,
    next_stage_id: AtomicUsize,
    attempt_id: AtomicUsize,
    // only one job builds and runs its stages at a time
    scheduler_lock: Mutex<()>,
}

impl LocalScheduler {
    pub fn new(num_workers: usize) -> Self {
        LocalScheduler {
            num_workers,
            pool: Mutex::new(ThreadPool::with_name("worker".into(), num_workers)),
            next_job_id: AtomicUsize::new(0),
            next_stage_id: AtomicUsize::new(0),
            attempt_id: AtomicUsize::new(0),
            scheduler_lock: Mutex::new(()),
        }
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub(super) fn new_stage_id(&self) -> usize {
        self.next_stage_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn run_job<T: Data, U, F>(&self, final_rdd: Arc<dyn Rdd<Item = T>>, func: F) -> Result<Vec<U>>
    where
        U: Send + 'static,
        F: Fn(TaskContext, Box<dyn Iterator<Item = T>>) -> Result<U> + Send + Sync + 'static,
    {
        let _lock = self.scheduler_lock.lock();
        let job_id = self.next_job_id.fetch_add(1, Ordering::SeqCst);
        let start = Instant::now();
        log::debug!(
            "job {} started for collection #{}",
            job_id,
            final_rdd.get_rdd_id()
        );

        self.submit_missing_stages(final_rdd.get_rdd_base())?;

        let stage_id = self.new_stage_id();
        let results = self.run_stage(stage_id, move |task| {
            let iter = final_rdd.iterator(task.split_id)?;
            func(task, iter)
        })?;
        log::debug!(
            "job {} finished in {:.3} s",
            job_id,
            start.elapsed().as_secs_f64()
        );
        Ok(results)
    }

    /// Runs whatever stages `rdd` is missing without reading it.
    pub fn materialize(&self, rdd: Arc<dyn RddBase>) -> Result<()> {
        let _lock = self.scheduler_lock.lock();
        self.submit_missing_stages(rdd)
    }

    pub(super) fn run_stage<U, F>(&self, stage_id: usize, func: F) -> Result<Vec<U>>
    where
        U: Send + 'static,
        F: Fn(TaskContext) -> Result<U> + Send + Sync + 'static,
    {
        let func = Arc::new(func);
        let (tx, rx) = crossbeam::channel::unbounded();
        let pool = self.pool.lock().clone();
        for split in 0..self.num_workers {
            let tx = tx.clone();
            let func = func.clone();
            let attempt_id = self.attempt_id.fetch_add(1, Ordering::SeqCst);
            pool.execute(move || {
                let result = func(TaskContext::new(stage_id, split, attempt_id));
                // the stage is only gone once every sender has been dropped
                let _ = tx.send((split, result));
            });
        }
        drop(tx);

        let mut results: Vec<Option<U>> = (0..self.num_workers).map(|_| None).collect();
        let mut failure: Option<(usize, Error)> = None;
        for (split, result) in rx.iter() {
            match result {
                Ok(value) => results[split] = Some(value),
                Err(err) => {
                    if failure.as_ref().map_or(true, |(first, _)| split < *first) {
                        failure = Some((split, err));
                    }
                }
            }
        }
        if let Some((split, err)) = failure {
            log::error!("stage {} failed in split {}: {}", stage_id, split, err);
            return Err(err);
        }

        results
            .into_iter()
            .enumerate()
            .map(|(split, result)| result.ok_or(Error::TaskPanicked { stage_id, split }))
            .collect()
    }
}
