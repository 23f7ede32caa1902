//! Opens the state store and the chain provider and instantiates the
//! active reducers.

use std::sync::Arc;

use rs_01_reducer_sync::{ChainProviderFactory, Reducer, ReducerStateStore};
use tracing::{info, instrument};

use crate::adapters::{FileStateStore, ReplayProviderFactory};
use crate::container::config::{ConfigError, IndexerConfig, StorageBackend, StorageConfig};
use crate::reducers::builtin_reducers;
use crate::RuntimeError;

/// Everything `ReducerSyncService::initialize` needs.
pub struct IndexerContainer {
    pub config: IndexerConfig,
    pub store: Arc<dyn ReducerStateStore>,
    pub factory: Arc<dyn ChainProviderFactory>,
    pub reducers: Vec<Arc<dyn Reducer>>,
}

impl IndexerContainer {
    #[instrument(name = "indexer_init", skip(config))]
    pub async fn build(config: IndexerConfig) -> Result<Self, RuntimeError> {
        let store = open_store(&config.storage).await?;

        let replay_file = config
            .connection
            .replay_file
            .as_deref()
            .ok_or(ConfigError::MissingConnection)?;
        let factory = ReplayProviderFactory::open(replay_file, config.connection.hold_open).await?;

        let reducers = builtin_reducers(&config);
        info!(
            reducers = ?reducers.iter().map(|r| r.name().to_string()).collect::<Vec<_>>(),
            backend = ?config.storage.backend,
            "Indexer container ready"
        );

        Ok(Self {
            config,
            store,
            factory: Arc::new(factory),
            reducers,
        })
    }
}

async fn open_store(storage: &StorageConfig) -> Result<Arc<dyn ReducerStateStore>, RuntimeError> {
    match storage.backend {
        StorageBackend::File => {
            let store = FileStateStore::open(&storage.data_dir, storage.sync_writes).await?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "rocksdb")]
        StorageBackend::Rocksdb => {
            use crate::adapters::{RocksDbConfig, RocksDbStateStore};

            let store = RocksDbStateStore::open(RocksDbConfig {
                path: storage.data_dir.clone(),
                sync_writes: storage.sync_writes,
                ..Default::default()
            })?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "rocksdb"))]
        StorageBackend::Rocksdb => Err(ConfigError::BackendUnavailable(StorageBackend::Rocksdb).into()),
    }
}
