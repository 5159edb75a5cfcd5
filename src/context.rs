use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use crate::cache::MemoryCache;
use crate::env::Configuration;
use crate::error::{Error, Result};
use crate::io::LinesRdd;
use crate::rdd::{Dia, GenerateRdd, ParallelCollection, Rdd, RddBase};
use crate::scheduler::{LocalScheduler, TaskContext};
use crate::serializable_traits::Data;
use crate::shuffle::{ShuffleManager, Traffic};
use log::LevelFilter;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use simplelog::*;
use uuid::Uuid;

static LOGGER: OnceCell<()> = OnceCell::new();

type PendingAction = Box<dyn FnOnce() + Send>;

/// Execution driver and run context of one computation.
///
/// Owns the worker pool, the physical storage of cached collections and shuffle buckets, and the
/// run-wide state every component reports into: start time, worker rank and the sink for
/// structured result lines.
pub struct Context {
    next_rdd_id: AtomicUsize,
    next_shuffle_id: AtomicUsize,
    scheduler: LocalScheduler,
    pub(crate) shuffle_manager: ShuffleManager,
    pub(crate) cache: MemoryCache,
    pending_actions: Mutex<Vec<PendingAction>>,
    consume: AtomicBool,
    started: Instant,
    results: Mutex<Vec<String>>,
    /// the executing job tmp work_dir
    work_dir: PathBuf,
    log_cleanup: bool,
}

impl Drop for Context {
    fn drop(&mut self) {
        log::debug!("dropping context, work dir {}", self.work_dir.display());
        Context::clean_up_work_dir(&self.work_dir, self.log_cleanup);
    }
}

impl Context {
    /// Creates a context from the process configuration (see [`Configuration::get`]).
    pub fn new() -> Result<Arc<Self>> {
        Context::with_config(Configuration::get()?.clone())
    }

    pub fn with_config(config: Configuration) -> Result<Arc<Self>> {
        let config = config.validate()?;
        let job_id = Uuid::new_v4().to_string();
        let job_work_dir = config.local_dir.join(format!("pagerank-job-{}", job_id));
        fs::create_dir_all(&job_work_dir).map_err(|e| Error::WorkDir {
            source: e,
            path: job_work_dir.clone(),
        })?;
        initialize_loggers(
            job_work_dir.join("driver.log"),
            config.logging.log_level.into(),
        );
        log::debug!(
            "starting context with {} workers in {}",
            config.num_workers,
            job_work_dir.display()
        );

        Ok(Arc::new(Context {
            next_rdd_id: AtomicUsize::new(0),
            next_shuffle_id: AtomicUsize::new(0),
            scheduler: LocalScheduler::new(config.num_workers),
            shuffle_manager: ShuffleManager::new(),
            cache: MemoryCache::new(),
            pending_actions: Mutex::new(Vec::new()),
            consume: AtomicBool::new(config.enable_consume),
            started: Instant::now(),
            results: Mutex::new(Vec::new()),
            work_dir: job_work_dir,
            log_cleanup: config.logging.log_cleanup,
        }))
    }

    fn clean_up_work_dir(work_dir: &Path, log_cleanup: bool) {
        if log_cleanup && fs::remove_dir_all(work_dir).is_err() {
            log::error!("failed removing tmp work dir: {}", work_dir.display());
        }
    }

    pub(crate) fn new_rdd_id(&self) -> usize {
        self.next_rdd_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn new_shuffle_id(&self) -> usize {
        self.next_shuffle_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Number of workers, which is the partition count of every collection.
    pub fn num_workers(&self) -> usize {
        self.scheduler.num_workers()
    }

    /// Rank of the worker driving the run; the driver runs on worker 0.
    pub fn my_rank(&self) -> usize {
        0
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// From now on, collections free their storage after their allowed number of reads.
    pub fn enable_consume(&self) {
        self.consume.store(true, Ordering::SeqCst);
    }

    pub fn consume_enabled(&self) -> bool {
        self.consume.load(Ordering::SeqCst)
    }

    pub fn traffic(&self) -> Traffic {
        self.shuffle_manager.traffic()
    }

    /// Number of cached partitions whose storage was freed by consumption.
    pub fn freed_partitions(&self) -> usize {
        self.cache.freed_partitions()
    }

    /// Records a structured result line and logs it.
    pub fn emit_result<S: Into<String>>(&self, line: S) {
        let line = line.into();
        log::info!("{}", line);
        self.results.lock().push(line);
    }

    pub fn result_lines(&self) -> Vec<String> {
        self.results.lock().clone()
    }

    /// Splits `seq` into one contiguous slice per worker.
    pub fn parallelize<T: Data>(self: &Arc<Self>, seq: Vec<T>) -> Dia<T> {
        Arc::new(ParallelCollection::new(self.clone(), seq))
    }

    /// Collection of `size` records where record `i` is `func(i)`, placed by index range.
    pub fn generate<T: Data, F>(self: &Arc<Self>, size: usize, func: F) -> Dia<T>
    where
        F: Fn(usize) -> T + Send + Sync + 'static,
    {
        Arc::new(GenerateRdd::new(self.clone(), size, func))
    }

    /// Text lines of the given files; directories stand for their files in name order.
    pub fn read_lines<P: AsRef<Path>>(self: &Arc<Self>, paths: &[P]) -> Result<Dia<String>> {
        Ok(Arc::new(LinesRdd::new(self.clone(), paths)?))
    }

    pub fn run_job<T: Data, U, F>(&self, rdd: Arc<dyn Rdd<Item = T>>, func: F) -> Result<Vec<U>>
    where
        U: Send + 'static,
        F: Fn(Box<dyn Iterator<Item = T>>) -> U + Send + Sync + 'static,
    {
        self.run_job_with_context(rdd, move |_, iter| Ok(func(iter)))
    }

    pub fn run_job_with_context<T: Data, U, F>(
        &self,
        rdd: Arc<dyn Rdd<Item = T>>,
        func: F,
    ) -> Result<Vec<U>>
    where
        U: Send + 'static,
        F: Fn(TaskContext, Box<dyn Iterator<Item = T>>) -> Result<U> + Send + Sync + 'static,
    {
        self.run_pending_actions();
        self.scheduler.run_job(rdd, func)
    }

    /// Runs the stages `rdd` is missing, materializing it if it is a storage point.
    pub(crate) fn materialize(&self, rdd: Arc<dyn RddBase>) -> Result<()> {
        self.run_pending_actions();
        self.scheduler.materialize(rdd)
    }

    pub(crate) fn defer_action(&self, action: PendingAction) {
        self.pending_actions.lock().push(action);
    }

    /// Runs the deferred actions registered so far, in registration order.
    pub(crate) fn run_pending_actions(&self) {
        let actions = std::mem::take(&mut *self.pending_actions.lock());
        if !actions.is_empty() {
            log::debug!("running {} deferred actions", actions.len());
        }
        for action in actions {
            action();
        }
    }
}

fn initialize_loggers<P: Into<PathBuf>>(file_path: P, log_level: LevelFilter) {
    fn _initializer(file_path: PathBuf, log_level: LevelFilter) {
        let mut combined: Vec<Box<dyn SharedLogger>> = Vec::new();
        combined.push(TermLogger::new(
            log_level,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ));
        match fs::File::create(&file_path) {
            Ok(file) => combined.push(WriteLogger::new(log_level, Config::default(), file)),
            Err(e) => eprintln!("not able to create log file {}: {}", file_path.display(), e),
        }
        if CombinedLogger::init(combined).is_ok() {
            log::info!("path for file logger: {}", file_path.display());
        }
    }

    LOGGER.get_or_init(move || _initializer(file_path.into(), log_level));
}
