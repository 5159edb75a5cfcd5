use std::{any, fmt, hash::Hash};

// Records flowing through a collection. Serialize/Deserialize are needed because shuffle
// buckets are encoded before they reach the reducing worker.
pub trait Data:
    Clone
    + any::Any
    + Send
    + Sync
    + fmt::Debug
    + serde::ser::Serialize
    + serde::de::DeserializeOwned
    + 'static
{
}

impl<
        T: Clone
            + any::Any
            + Send
            + Sync
            + fmt::Debug
            + serde::ser::Serialize
            + serde::de::DeserializeOwned
            + 'static,
    > Data for T
{
}

/// Record types usable as shuffle or join keys.
pub trait Key: Data + Eq + Hash {}

impl<T: Data + Eq + Hash> Key for T {}
