//! # Domain Invariants
//!
//! Business rules that must always hold true.

use shared_types::Slot;

/// Invariant: a reducer never consumes a block its dependencies have not
/// confirmed.
///
/// - `slot` must be at or after the reducer's start intersection;
/// - `slot` must be newer than anything the reducer already recorded;
/// - `slot` must be at or before every dependency's own latest point.
///
/// A reducer without dependencies passes an empty `dependency_frontiers`.
pub fn should_process_block(
    start_slot: Slot,
    own_latest_recorded: Option<Slot>,
    dependency_frontiers: impl IntoIterator<Item = Slot>,
    slot: Slot,
) -> bool {
    if slot < start_slot {
        return false;
    }
    if own_latest_recorded.is_some_and(|latest| slot <= latest) {
        return false;
    }
    dependency_frontiers
        .into_iter()
        .all(|frontier| slot <= frontier)
}

/// Invariant: retained history is long enough to undo a rollback.
///
/// Only reducers with recorded history are checked; an empty history means
/// the rollback targets the bootstrap point and there is nothing to undo.
pub fn invariant_rollback_within_buffer(
    latest_recorded: Option<Slot>,
    cutoff: Slot,
    buffer: usize,
) -> bool {
    match latest_recorded {
        Some(latest) => latest.saturating_sub(cutoff) <= buffer as u64,
        None => true,
    }
}
