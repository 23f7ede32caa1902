//! # Reducer Sync Indexer
//!
//! Replays chain-sync responses into a dependency-ordered set of reducers,
//! checkpointing each reducer's progress so it resumes where it stopped.
//!
//! ## Configuration
//!
//! - `RSX_CONFIG` - optional JSON config file
//! - `RSX_REPLAY_FILE` - JSON-lines chain-sync responses
//! - `RSX_DATA_DIR` / `RSX_STORAGE_BACKEND` - reducer state store
//! - `RSX_START_POINT` - bootstrap point as `slot.hash`
//! - `RSX_REDUCERS` - comma separated allow-list
//!
//! Logging is controlled by `RSX_LOG_LEVEL` (or `RUST_LOG`) and `RSX_JSON_LOGS`.

use anyhow::{Context, Result};
use indexer_runtime::reducers::BUILTIN_REDUCERS;
use indexer_runtime::{container::IndexerConfig, IndexerRuntime};
use indexer_telemetry::{init_telemetry, TelemetryConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry =
        init_telemetry(TelemetryConfig::from_env()).context("Failed to initialize telemetry")?;

    let config = IndexerConfig::load(BUILTIN_REDUCERS).context("Invalid configuration")?;
    info!(
        replay_file = ?config.connection.replay_file,
        data_dir = %config.storage.data_dir.display(),
        rollback_buffer = config.sync.rollback_buffer,
        "Starting reducer sync indexer"
    );

    let runtime = IndexerRuntime::new(config);
    let shutdown = runtime.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, shutting down");
            let _ = shutdown.send(true);
        }
    });

    if let Err(err) = runtime.run().await {
        error!(error = %err, "Indexer stopped with a fatal error");
        return Err(err).context("Reducer sync failed");
    }

    info!("Indexer stopped");
    Ok(())
}
