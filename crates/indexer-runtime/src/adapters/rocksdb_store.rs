//! # RocksDB Reducer State Store
//!
//! Keeps one row per reducer in the `reducer_state` column family, keyed by
//! reducer name and encoded as JSON.
//!
//! Enabled with the `rocksdb` feature.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteOptions, DB};
use rs_01_reducer_sync::{ReducerState, ReducerStateStore, StoreError};
use tracing::{debug, info};

/// Column family holding reducer rows.
pub const CF_REDUCER_STATE: &str = "reducer_state";

/// RocksDB tuning for the state store.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory
    pub path: PathBuf,
    /// Block cache size in bytes (default: 32MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 16MB)
    pub write_buffer_size: usize,
    /// Enable fsync after each write (default: true for durability)
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/reducer-state"),
            block_cache_size: 32 * 1024 * 1024,
            write_buffer_size: 16 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Create config for testing (smaller buffers, no sync)
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 1024 * 1024,
            write_buffer_size: 1024 * 1024,
            sync_writes: false,
        }
    }
}

pub struct RocksDbStateStore {
    db: Arc<DB>,
    sync_writes: bool,
}

impl RocksDbStateStore {
    /// Open or create the database.
    pub fn open(config: RocksDbConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let mut cf_opts = Options::default();
        cf_opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
        let descriptors = vec![ColumnFamilyDescriptor::new(CF_REDUCER_STATE, cf_opts)];

        let db = DB::open_cf_descriptors(&opts, &config.path, descriptors)
            .map_err(|e| StoreError::Backend(format!("Failed to open RocksDB: {e}")))?;
        info!(path = %config.path.display(), "Opened RocksDB state store");

        Ok(Self {
            db: Arc::new(db),
            sync_writes: config.sync_writes,
        })
    }

    fn column_family(&self) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(CF_REDUCER_STATE)
            .ok_or_else(|| StoreError::Backend(format!("missing column family {CF_REDUCER_STATE}")))
    }
}

fn decode(bytes: &[u8]) -> Result<ReducerState, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl ReducerStateStore for RocksDbStateStore {
    async fn load(&self, name: &str) -> Result<Option<ReducerState>, StoreError> {
        let cf = self.column_family()?;
        let value = self
            .db
            .get_cf(cf, name.as_bytes())
            .map_err(|e| StoreError::Backend(format!("RocksDB get failed: {e}")))?;
        value.as_deref().map(decode).transpose()
    }

    async fn load_all(&self) -> Result<Vec<ReducerState>, StoreError> {
        let cf = self.column_family()?;
        let mut rows = Vec::new();
        // Keys are names, so iteration order is already name order.
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) =
                item.map_err(|e| StoreError::Backend(format!("RocksDB scan failed: {e}")))?;
            rows.push(decode(&value)?);
        }
        Ok(rows)
    }

    async fn save(&self, state: &ReducerState) -> Result<(), StoreError> {
        let value =
            serde_json::to_vec(state).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);

        let cf = self.column_family()?;
        self.db
            .put_cf_opt(cf, state.name.as_bytes(), value, &write_opts)
            .map_err(|e| StoreError::Backend(format!("RocksDB put failed: {e}")))?;
        debug!(reducer = %state.name, "Reducer state written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Point;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_rocksdb_rows_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();

        {
            let store =
                RocksDbStateStore::open(RocksDbConfig::for_testing(temp_dir.path())).unwrap();
            let mut row = ReducerState::new("TransactionCountReducer", Point::new(5, "h5"));
            row.latest_intersections = vec![Point::new(7, "h7")];
            store.save(&row).await.unwrap();
            store
                .save(&ReducerState::new("BlockReducer", Point::new(5, "h5")))
                .await
                .unwrap();
        }

        let store = RocksDbStateStore::open(RocksDbConfig::for_testing(temp_dir.path())).unwrap();
        let rows = store.load_all().await.unwrap();
        let names: Vec<&str> = rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, vec!["BlockReducer", "TransactionCountReducer"]);

        let row = store.load("TransactionCountReducer").await.unwrap().unwrap();
        assert_eq!(row.latest_intersections, vec![Point::new(7, "h7")]);
        assert!(store.load("Missing").await.unwrap().is_none());
    }
}
