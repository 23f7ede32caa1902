//! # Adapters
//!
//! Port implementations for the runtime: the replay chain provider and the
//! reducer state stores.
//!
//! ## Storage Backends
//!
//! | Backend | Feature | Layout |
//! |---------|---------|--------|
//! | `FileStateStore` | always | one JSON file per reducer |
//! | `RocksDbStateStore` | `rocksdb` | `reducer_state` column family |

pub mod file_store;
pub mod replay;
#[cfg(feature = "rocksdb")]
pub mod rocksdb_store;

pub use file_store::FileStateStore;
pub use replay::{ReplayChain, ReplayProviderFactory};
#[cfg(feature = "rocksdb")]
pub use rocksdb_store::{RocksDbConfig, RocksDbStateStore, CF_REDUCER_STATE};
