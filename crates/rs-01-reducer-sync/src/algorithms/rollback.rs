//! Mass-rollback guard

use shared_types::Slot;

use crate::domain::errors::SyncError;
use crate::domain::invariants::invariant_rollback_within_buffer;

/// Reject rollbacks deeper than the retained history can undo.
///
/// `latest_recorded` is the reducer's newest recorded slot, `None` when it
/// has no history yet.
pub fn check_rollback_depth(
    reducer: &str,
    latest_recorded: Option<Slot>,
    cutoff: Slot,
    buffer: usize,
) -> Result<(), SyncError> {
    if invariant_rollback_within_buffer(latest_recorded, cutoff, buffer) {
        return Ok(());
    }

    Err(SyncError::MassRollback {
        reducer: reducer.to_string(),
        cutoff,
        latest_slot: latest_recorded.unwrap_or_default(),
        buffer,
    })
}
