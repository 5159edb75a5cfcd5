use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use log::LevelFilter;
use once_cell::sync::OnceCell;
use serde_derive::{Deserialize, Serialize};

static CONF: OnceCell<Configuration> = OnceCell::new();

mod config_vars {
    pub(super) const CONF_PATH: &str = "PAGERANK_CONF";
    pub(super) const WORKERS: &str = "PAGERANK_WORKERS";
    pub(super) const LOG_LEVEL: &str = "PAGERANK_LOG_LEVEL";
    pub(super) const LOCAL_DIR: &str = "PAGERANK_LOCAL_DIR";
}

use config_vars::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn parse(level: &str) -> Result<Self> {
        match level.to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(Error::InvalidConfig(format!("unknown log level {:?}", other))),
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(val: LogLevel) -> Self {
        match val {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: LogLevel,
    /// Remove the job work dir, driver log included, when the context is dropped.
    pub log_cleanup: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: LogLevel::Info,
            log_cleanup: true,
        }
    }
}

/// Runtime configuration of the execution driver.
///
/// Loaded once per process from the TOML file named by `PAGERANK_CONF` (defaults when the
/// variable is unset); `PAGERANK_WORKERS`, `PAGERANK_LOG_LEVEL` and `PAGERANK_LOCAL_DIR`
/// override the file values.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Configuration {
    /// Number of simulated workers, which is also the partition count of every collection.
    pub num_workers: usize,
    pub local_dir: PathBuf,
    pub logging: LoggingConfig,
    /// Free storage of collections after their allowed number of reads.
    pub enable_consume: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            num_workers: num_cpus::get(),
            local_dir: std::env::temp_dir(),
            logging: LoggingConfig::default(),
            enable_consume: false,
        }
    }
}

impl Configuration {
    pub fn get() -> Result<&'static Configuration> {
        CONF.get_or_try_init(Self::load)
    }

    fn load() -> Result<Self> {
        let conf = match std::env::var_os(CONF_PATH) {
            Some(path) => Configuration::load_from(path)?,
            None => Configuration::default(),
        };
        conf.with_env_overrides()
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = std::fs::read_to_string(&path).map_err(|e| Error::LoadConfig {
            source: e,
            path: path.as_ref().into(),
        })?;

        toml::from_str(&s).map_err(|e| Error::ParseConfig {
            source: e,
            path: path.as_ref().into(),
        })
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(workers) = std::env::var(WORKERS) {
            self.num_workers = workers.parse().map_err(|_| {
                Error::InvalidConfig(format!("{} must be a positive integer", WORKERS))
            })?;
        }
        if let Ok(level) = std::env::var(LOG_LEVEL) {
            self.logging.log_level = LogLevel::parse(&level)?;
        }
        if let Some(dir) = std::env::var_os(LOCAL_DIR) {
            self.local_dir = dir.into();
        }
        self.validate()
    }

    pub(crate) fn validate(self) -> Result<Self> {
        if self.num_workers == 0 {
            return Err(Error::InvalidConfig("num_workers must be at least 1".into()));
        }
        Ok(self)
    }
}
