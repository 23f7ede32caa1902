//! # Indexer Configuration
//!
//! Unified configuration for the sync core, the upstream connection, the
//! state store and the active reducer set.
//!
//! Loading order: defaults, then the JSON file named by `RSX_CONFIG`, then
//! environment overrides, then validation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rs_01_reducer_sync::SyncConfig;
use serde::{Deserialize, Serialize};
use shared_types::{Point, PointParseError};
use thiserror::Error;

/// Configuration errors. All are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {variable}: {message}")]
    InvalidEnv { variable: String, message: String },

    #[error("Invalid start point for {variable}: {source}")]
    InvalidPoint {
        variable: String,
        #[source]
        source: PointParseError,
    },

    #[error("No upstream connection configured: set connection.replay_file or RSX_REPLAY_FILE")]
    MissingConnection,

    #[error("Unknown reducer in allow-list: {0}")]
    UnknownReducer(String),

    #[error("Reducer listed twice in allow-list: {0}")]
    DuplicateReducer(String),

    #[error("Rollback buffer must be at least 1")]
    EmptyRollbackBuffer,

    #[error("Storage backend {0:?} is not compiled in")]
    BackendUnavailable(StorageBackend),
}

/// Complete indexer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Checkpointing, flush cadence and bootstrap points.
    pub sync: SyncConfig,
    /// Upstream chain-sync connection.
    pub connection: ConnectionConfig,
    /// Reducer state store.
    pub storage: StorageConfig,
    /// Active reducer allow-list. Empty enables every built-in reducer.
    pub reducers: Vec<String>,
}

/// Upstream connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// JSON-lines file of chain-sync responses to replay.
    pub replay_file: Option<PathBuf>,
    /// Keep subscriptions open after the file is exhausted instead of
    /// ending them (which is fatal).
    pub hold_open: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            replay_file: None,
            hold_open: true,
        }
    }
}

/// Which `ReducerStateStore` implementation to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per reducer.
    #[default]
    File,
    /// RocksDB column family. Requires the `rocksdb` feature.
    Rocksdb,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Data directory for reducer state.
    pub data_dir: PathBuf,
    /// fsync after each write.
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            data_dir: PathBuf::from("./data/reducer-state"),
            sync_writes: true,
        }
    }
}

impl IndexerConfig {
    /// Load from `RSX_CONFIG` (if set) and the process environment, then
    /// validate against `known_reducers`.
    pub fn load(known_reducers: &[&str]) -> Result<Self, ConfigError> {
        let mut config = match std::env::var("RSX_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate(known_reducers)?;
        Ok(config)
    }

    /// Parse a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `RSX_REPLAY_FILE` | `connection.replay_file` |
    /// | `RSX_HOLD_OPEN` | `connection.hold_open` |
    /// | `RSX_DATA_DIR` | `storage.data_dir` |
    /// | `RSX_STORAGE_BACKEND` | `storage.backend` (`file` / `rocksdb`) |
    /// | `RSX_ROLLBACK_BUFFER` | `sync.rollback_buffer` |
    /// | `RSX_FLUSH_INTERVAL_MS` | `sync.flush_interval_ms` |
    /// | `RSX_NETWORK_MAGIC` | `sync.network_magic` |
    /// | `RSX_START_POINT` | `sync.default_start` (`origin` or `slot/hash`) |
    /// | `RSX_REDUCERS` | `reducers` (comma separated) |
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("RSX_REPLAY_FILE") {
            self.connection.replay_file = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup("RSX_HOLD_OPEN") {
            self.connection.hold_open = parse_env("RSX_HOLD_OPEN", &value)?;
        }
        if let Some(dir) = lookup("RSX_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup("RSX_STORAGE_BACKEND") {
            self.storage.backend = match value.to_ascii_lowercase().as_str() {
                "file" => StorageBackend::File,
                "rocksdb" => StorageBackend::Rocksdb,
                other => {
                    return Err(ConfigError::InvalidEnv {
                        variable: "RSX_STORAGE_BACKEND".to_string(),
                        message: format!("unknown backend '{other}'"),
                    })
                }
            };
        }
        if let Some(value) = lookup("RSX_ROLLBACK_BUFFER") {
            self.sync.rollback_buffer = parse_env("RSX_ROLLBACK_BUFFER", &value)?;
        }
        if let Some(value) = lookup("RSX_FLUSH_INTERVAL_MS") {
            self.sync.flush_interval_ms = parse_env("RSX_FLUSH_INTERVAL_MS", &value)?;
        }
        if let Some(value) = lookup("RSX_NETWORK_MAGIC") {
            self.sync.network_magic = parse_env("RSX_NETWORK_MAGIC", &value)?;
        }
        if let Some(value) = lookup("RSX_START_POINT") {
            let point = value
                .parse::<Point>()
                .map_err(|source| ConfigError::InvalidPoint {
                    variable: "RSX_START_POINT".to_string(),
                    source,
                })?;
            self.sync.default_start = Some(point);
        }
        if let Some(value) = lookup("RSX_REDUCERS") {
            self.reducers = value
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(())
    }

    /// Check connection parameters, the rollback buffer and the reducer
    /// allow-list.
    pub fn validate(&self, known_reducers: &[&str]) -> Result<(), ConfigError> {
        if self.connection.replay_file.is_none() {
            return Err(ConfigError::MissingConnection);
        }
        if self.sync.rollback_buffer == 0 {
            return Err(ConfigError::EmptyRollbackBuffer);
        }

        let mut seen = HashSet::new();
        for name in &self.reducers {
            if !known_reducers.contains(&name.as_str()) {
                return Err(ConfigError::UnknownReducer(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateReducer(name.clone()));
            }
        }

        for name in self.sync.start_overrides.keys() {
            if !known_reducers.contains(&name.as_str()) {
                return Err(ConfigError::UnknownReducer(name.clone()));
            }
        }
        Ok(())
    }

    /// Whether `reducer` is enabled by the allow-list.
    pub fn is_active(&self, reducer: &str) -> bool {
        self.reducers.is_empty() || self.reducers.iter().any(|name| name == reducer)
    }
}

fn parse_env<T>(variable: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        variable: variable.to_string(),
        message: e.to_string(),
    })
}
