//! Transaction counts per block, derived on top of the block view.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use rs_01_reducer_sync::{Reducer, ReducerError};
use shared_types::{Block, Slot};

use super::block::{BlockReducer, BlockView};

/// Counts transactions per slot. Every block it applies must already be in
/// the block view.
#[derive(Debug)]
pub struct TransactionCountReducer {
    blocks: BlockView,
    counts: Arc<RwLock<BTreeMap<Slot, usize>>>,
}

impl TransactionCountReducer {
    pub const NAME: &'static str = "TransactionCountReducer";

    pub fn new(blocks: BlockView) -> Self {
        Self {
            blocks,
            counts: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn count_at(&self, slot: Slot) -> Option<usize> {
        self.counts.read().get(&slot).copied()
    }

    /// Transactions across every indexed block.
    pub fn total(&self) -> usize {
        self.counts.read().values().sum()
    }
}

#[async_trait]
impl Reducer for TransactionCountReducer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn dependencies(&self) -> Vec<String> {
        vec![BlockReducer::NAME.to_string()]
    }

    async fn roll_forward(&self, block: &Block) -> Result<(), ReducerError> {
        let point = block.point();
        if !self.blocks.contains(&point) {
            return Err(ReducerError::InvalidBlock(format!(
                "{point} is not in the {} view",
                BlockReducer::NAME
            )));
        }
        self.counts
            .write()
            .insert(block.slot(), block.transactions().len());
        Ok(())
    }

    async fn roll_backward(&self, cutoff: Slot) -> Result<(), ReducerError> {
        self.counts.write().split_off(&cutoff);
        Ok(())
    }
}
