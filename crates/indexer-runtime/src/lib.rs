//! # Indexer Runtime Library
//!
//! Wires the reducer sync core to a concrete chain provider, state store and
//! reducer set. The main entry point is the `main.rs` binary; the library
//! exists so the wiring can be tested end to end.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file, then environment)
//! 2. Open the reducer state store and the chain provider
//! 3. Initialize reducer sync: dependency graph, stored rows, bootstrap
//! 4. Run one subscription per root reducer until shutdown or a fatal error

pub mod adapters;
pub mod container;
pub mod reducers;

use std::sync::Arc;

use rs_01_reducer_sync::{ChainProviderError, ReducerSyncService, StoreError, SyncError};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::container::{ConfigError, IndexerConfig, IndexerContainer};

/// Fatal runtime errors. Any of these ends the process with a non-zero exit.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Provider(#[from] ChainProviderError),
}

/// The indexer process.
pub struct IndexerRuntime {
    config: IndexerConfig,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl IndexerRuntime {
    pub fn new(config: IndexerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Sender that stops the runtime when `true` is sent.
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown_tx.clone()
    }

    /// Run until shutdown is requested or sync fails.
    pub async fn run(self) -> Result<(), RuntimeError> {
        let container = IndexerContainer::build(self.config).await?;

        let service = ReducerSyncService::initialize(
            container.config.sync.clone(),
            container.reducers,
            container.store,
            container.factory,
        )
        .await?;
        info!(
            reducers = service.graph().node_count(),
            roots = ?service.graph().root_reducers(),
            "Reducer sync initialized"
        );

        let result = Arc::new(service).run(self.shutdown_rx).await;

        if let Ok(metrics) = indexer_telemetry::encode_metrics() {
            debug!(%metrics, "Final metrics");
        }
        result.map_err(RuntimeError::from)
    }
}
