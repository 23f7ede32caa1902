//! Outbound Ports (Driven Ports / SPI)
//!
//! Reducers, the upstream chain-sync provider and the checkpoint store.

use std::pin::Pin;

use async_trait::async_trait;
use shared_types::{Block, NextResponse, Point, Slot};
use tokio_stream::Stream;

use crate::domain::checkpoint::ReducerState;
use crate::domain::errors::{ChainProviderError, ReducerError, StoreError};

/// A derivation unit with its own materialized view.
///
/// Reducers own whatever storage handle they need; the service only tells
/// them which blocks to apply or undo.
#[async_trait]
pub trait Reducer: Send + Sync {
    /// Stable name, also the key of the persisted checkpoint row.
    fn name(&self) -> &str;

    /// Names of the reducers whose views this one reads.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Apply a block to the view.
    async fn roll_forward(&self, block: &Block) -> Result<(), ReducerError>;

    /// Remove every effect of blocks with `slot >= cutoff`.
    ///
    /// May be called with nothing to undo and must then succeed.
    async fn roll_backward(&self, cutoff: Slot) -> Result<(), ReducerError>;

    /// Bootstrap point derived from the view itself, used when no row is
    /// stored and no per-reducer start is configured.
    async fn query_tip(&self) -> Result<Option<Point>, ReducerError> {
        Ok(None)
    }
}

/// Chain-sync event stream returned by a provider.
pub type NextResponseStream =
    Pin<Box<dyn Stream<Item = Result<NextResponse, ChainProviderError>> + Send>>;

/// Upstream chain-sync connection.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Find the newest of `intersections` on the upstream chain and stream
    /// events from there.
    ///
    /// The stream starts with a `RollBack` to the intersection found. It
    /// ends when the upstream closes.
    async fn start_sync(
        &self,
        intersections: Vec<Point>,
        network_magic: u64,
    ) -> Result<NextResponseStream, ChainProviderError>;

    /// Current upstream tip.
    async fn get_tip(&self, network_magic: u64) -> Result<Point, ChainProviderError>;
}

/// Opens upstream connections. Called once per root reducer.
#[async_trait]
pub trait ChainProviderFactory: Send + Sync {
    async fn create_provider(&self) -> Result<Box<dyn ChainProvider>, ChainProviderError>;
}

/// Durable store for `ReducerState` rows, keyed by reducer name.
#[async_trait]
pub trait ReducerStateStore: Send + Sync {
    async fn load(&self, name: &str) -> Result<Option<ReducerState>, StoreError>;

    /// Every stored row, ordered by name.
    async fn load_all(&self) -> Result<Vec<ReducerState>, StoreError>;

    /// Whole-row overwrite.
    async fn save(&self, state: &ReducerState) -> Result<(), StoreError>;
}
