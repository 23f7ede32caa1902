//! Block headers by slot.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use rs_01_reducer_sync::{Reducer, ReducerError};
use shared_types::{Block, Era, Point, Slot};

/// What the block view keeps per slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSummary {
    pub hash: String,
    pub era: Era,
    pub transactions: usize,
}

/// Shared read handle on the block view.
#[derive(Debug, Clone, Default)]
pub struct BlockView {
    rows: Arc<RwLock<BTreeMap<Slot, BlockSummary>>>,
}

impl BlockView {
    pub fn get(&self, slot: Slot) -> Option<BlockSummary> {
        self.rows.read().get(&slot).cloned()
    }

    /// True when the view holds exactly this point.
    pub fn contains(&self, point: &Point) -> bool {
        self.rows
            .read()
            .get(&point.slot)
            .is_some_and(|summary| summary.hash == point.hash)
    }

    pub fn latest(&self) -> Option<Point> {
        self.rows
            .read()
            .last_key_value()
            .map(|(slot, summary)| Point::new(*slot, summary.hash.clone()))
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

/// Root reducer indexing every block header.
#[derive(Debug, Default)]
pub struct BlockReducer {
    view: BlockView,
}

impl BlockReducer {
    pub const NAME: &'static str = "BlockReducer";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> BlockView {
        self.view.clone()
    }
}

#[async_trait]
impl Reducer for BlockReducer {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn roll_forward(&self, block: &Block) -> Result<(), ReducerError> {
        self.view.rows.write().insert(
            block.slot(),
            BlockSummary {
                hash: block.hash().to_string(),
                era: block.era(),
                transactions: block.transactions().len(),
            },
        );
        Ok(())
    }

    async fn roll_backward(&self, cutoff: Slot) -> Result<(), ReducerError> {
        self.view.rows.write().split_off(&cutoff);
        Ok(())
    }

    async fn query_tip(&self) -> Result<Option<Point>, ReducerError> {
        Ok(self.view.latest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::TransactionBody;

    #[tokio::test]
    async fn test_forward_and_backward() {
        let reducer = BlockReducer::new();
        let view = reducer.view();

        for slot in [10, 20, 30] {
            let block = Block::new(slot, format!("h{slot}"))
                .with_era(Era::Babbage)
                .with_transactions(vec![TransactionBody::new("tx")]);
            reducer.roll_forward(&block).await.unwrap();
        }
        assert_eq!(view.len(), 3);
        assert_eq!(view.get(20).unwrap().era, Era::Babbage);
        assert!(view.contains(&Point::new(30, "h30")));
        assert!(!view.contains(&Point::new(30, "other")));

        reducer.roll_backward(20).await.unwrap();
        assert_eq!(view.latest(), Some(Point::new(10, "h10")));
        assert_eq!(reducer.query_tip().await.unwrap(), Some(Point::new(10, "h10")));
    }

    #[tokio::test]
    async fn test_empty_view_has_no_tip() {
        let reducer = BlockReducer::new();
        assert!(reducer.view().is_empty());
        assert_eq!(reducer.query_tip().await.unwrap(), None);
        reducer.roll_backward(0).await.unwrap();
    }
}
