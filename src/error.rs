use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not parse edge line {line:?}: {reason}")]
    InputFormat { line: String, reason: String },

    #[error("key {key} is outside of the index universe [0, {universe})")]
    KeyRange { key: usize, universe: usize },

    #[error("collection #{rdd_id} was already consumed; call keep() before reading it again")]
    UseAfterConsume { rdd_id: usize },

    #[error("zip over misaligned partitions in #{rdd_id}, split {split}: {left} vs {right} records")]
    ZipMisaligned {
        rdd_id: usize,
        split: usize,
        left: usize,
        right: usize,
    },

    #[error("output of shuffle #{shuffle_id} for reduce split {reduce_id} is missing")]
    ShuffleOutputMissing { shuffle_id: usize, reduce_id: usize },

    #[error("task for split {split} of stage {stage_id} panicked")]
    TaskPanicked { stage_id: usize, split: usize },

    #[error("failed to downcast to {0}")]
    DowncastFailure(&'static str),

    #[error("failed to read input {path}")]
    InputRead {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("failed to write output {path}")]
    OutputWrite {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("failed to create work dir {path}")]
    WorkDir {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("failed to (de)serialize shuffle data")]
    Serialization(#[from] bincode::Error),

    #[error("failed to load configuration file {path}")]
    LoadConfig {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("failed to parse configuration file {path}")]
    ParseConfig {
        source: toml::de::Error,
        path: PathBuf,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),
}
