//! Inbound Ports (Driving Ports / API)

use std::sync::Arc;

use async_trait::async_trait;
use shared_types::{Block, Point, RollbackKind, Slot};

use crate::domain::checkpoint::CheckpointSnapshot;
use crate::domain::errors::SyncError;

/// Primary Reducer Sync API
#[async_trait]
pub trait ReducerSyncApi: Send + Sync {
    /// Whether `reducer` may consume a block at `slot` right now.
    fn should_process_block(&self, reducer: &str, slot: Slot) -> Result<bool, SyncError>;

    /// Resume points for `reducer`, newest first.
    ///
    /// Accounts for every transitive dependent so resuming never skips a
    /// block a slower dependent still needs.
    fn safe_intersection_points(&self, reducer: &str) -> Result<Vec<Point>, SyncError>;

    /// Latest published checkpoint of `reducer`.
    fn checkpoint(&self, reducer: &str) -> Result<Arc<CheckpointSnapshot>, SyncError>;

    /// Apply a block to `root` and then to each of its transitive dependents
    /// in topological order.
    ///
    /// Returns how many reducers applied the block.
    async fn roll_forward_lineage(&self, root: &str, block: &Block) -> Result<usize, SyncError>;

    /// Undo everything after (`Exclusive`) or from (`Inclusive`) `point` for
    /// `root` and its transitive dependents.
    async fn roll_backward_lineage(
        &self,
        root: &str,
        point: &Point,
        kind: RollbackKind,
    ) -> Result<(), SyncError>;

    /// Persist every checkpoint touched since the last flush.
    ///
    /// Returns how many rows were written.
    async fn flush(&self) -> Result<usize, SyncError>;
}
