//! # Built-in Reducers
//!
//! In-memory views used to exercise the sync core end to end. Each reducer
//! exports its name as a constant; dependents list those constants.

mod block;
mod transaction_count;

use std::sync::Arc;

use rs_01_reducer_sync::Reducer;

use crate::container::IndexerConfig;

pub use block::{BlockReducer, BlockSummary, BlockView};
pub use transaction_count::TransactionCountReducer;

/// Names of every built-in reducer.
pub const BUILTIN_REDUCERS: &[&str] = &[BlockReducer::NAME, TransactionCountReducer::NAME];

/// Instantiate the built-in reducers enabled by the allow-list.
///
/// Views are wired before filtering, so a dependent enabled without its
/// dependency is still returned and rejected by the graph builder.
pub fn builtin_reducers(config: &IndexerConfig) -> Vec<Arc<dyn Reducer>> {
    let blocks = BlockReducer::new();
    let transactions = TransactionCountReducer::new(blocks.view());

    let all: Vec<Arc<dyn Reducer>> = vec![Arc::new(blocks), Arc::new(transactions)];
    all.into_iter()
        .filter(|reducer| config.is_active(reducer.name()))
        .collect()
}
