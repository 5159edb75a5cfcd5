use std::fmt;

pub(self) mod shuffle_fetcher;
pub(self) mod shuffle_manager;
// re-exports:
pub(crate) use shuffle_fetcher::ShuffleFetcher;
pub(crate) use shuffle_manager::{ReduceRead, ShuffleManager};

/// Serialized shuffle bytes moved so far, split by whether the bucket stayed on the worker that
/// produced it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Traffic {
    pub local_bytes: u64,
    pub remote_bytes: u64,
    pub buckets: u64,
}

impl Traffic {
    pub fn total_bytes(&self) -> u64 {
        self.local_bytes + self.remote_bytes
    }
}

impl fmt::Display for Traffic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} remote / {} local bytes",
            self.remote_bytes, self.local_bytes
        )
    }
}
