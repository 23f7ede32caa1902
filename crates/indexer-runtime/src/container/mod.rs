//! # Indexer Container
//!
//! Configuration plus the concrete adapters the sync service is built from.

pub mod config;
pub mod services;

pub use config::{ConfigError, ConnectionConfig, IndexerConfig, StorageBackend, StorageConfig};
pub use services::IndexerContainer;
