mod dag_scheduler;
mod local_scheduler;
mod task;

pub(crate) use self::local_scheduler::LocalScheduler;
pub use self::task::TaskContext;
