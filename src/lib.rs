//! A lazily evaluated, partitioned dataflow engine and the PageRank benchmark built on it.
//!
//! Collections ([`Dia`]) are DAG nodes; operators only extend the graph and actions such as
//! [`Rdd::collect`] or [`Rdd::execute`] run the stages they need on a local worker pool.

mod aggregator;
mod cache;
pub mod context;
mod dependency;
pub mod env;
pub mod error;
pub mod io;
pub mod page_rank;
pub mod partitioner;
pub mod rdd;
mod scheduler;
mod serializable_traits;
mod shuffle;
mod utils;

pub use aggregator::Aggregator;
pub use cache::Consumers;
pub use context::Context;
pub use env::{Configuration, LogLevel, LoggingConfig};
pub use error::{Error, Result};
pub use partitioner::Partitioner;
pub use rdd::{
    select_join_strategy, ActionFuture, Dia, JoinStrategy, LocationDetection, OpKind, PairRdd,
    Rdd, RddBase,
};
pub use scheduler::TaskContext;
pub use serializable_traits::{Data, Key};
pub use shuffle::Traffic;
