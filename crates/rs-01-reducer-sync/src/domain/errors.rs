//! # Domain Errors
//!
//! Error types for Reducer Sync.
//!
//! Every variant of `SyncError` is fatal for the process: configuration
//! errors before any subscription opens, the rest while syncing.

use shared_types::Slot;
use thiserror::Error;

/// Failure inside a reducer's own transform.
#[derive(Debug, Error)]
pub enum ReducerError {
    /// The reducer's view storage failed.
    #[error("Reducer storage failed: {0}")]
    Storage(String),

    /// The block could not be interpreted by the reducer.
    #[error("Invalid block data: {0}")]
    InvalidBlock(String),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

/// Chain provider failures.
#[derive(Debug, Clone, Error)]
pub enum ChainProviderError {
    /// Could not reach the upstream node.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// None of the requested intersections is on the provider's chain.
    #[error("No intersection found among {requested} requested points")]
    IntersectionNotFound {
        /// Number of points offered
        requested: usize,
    },

    /// The upstream sent something the provider could not handle.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The provider was misconfigured.
    #[error("Provider misconfigured: {0}")]
    Configuration(String),
}

/// Reducer state store failures.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Underlying I/O failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// A stored row could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backend specific failure.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Reducer Sync error types.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Two reducers registered under the same name.
    #[error("Duplicate reducer name: {name}")]
    DuplicateReducer {
        /// Offending name
        name: String,
    },

    /// A declared dependency is not part of the active reducer set.
    #[error("Reducer {reducer} depends on {dependency}, which is not registered")]
    UnresolvedDependency {
        /// Dependent reducer
        reducer: String,
        /// Missing dependency
        dependency: String,
    },

    /// Direct or indirect dependency cycle.
    #[error("Dependency cycle: {dependency} depends back on {reducer}")]
    DependencyCycle {
        /// Reducer whose dependency chain loops back to it
        reducer: String,
        /// Dependency that declares `reducer` as its own dependency
        dependency: String,
    },

    /// A reducer's transform failed.
    #[error("Reducer {reducer} failed at slot {slot} after {elapsed_ms}ms during {action}: {source}")]
    ReducerFailed {
        /// Reducer name
        reducer: String,
        /// Block slot, or rollback cutoff
        slot: Slot,
        /// `roll_forward` or `roll_backward`
        action: &'static str,
        /// Time spent in the transform
        elapsed_ms: u128,
        /// Underlying error
        #[source]
        source: ReducerError,
    },

    /// Requested rollback is deeper than the retained history.
    #[error("Critical node: {reducer} asked to roll back to slot {cutoff} from {latest_slot}, beyond the rollback buffer of {buffer}")]
    MassRollback {
        /// Reducer name
        reducer: String,
        /// First slot to undo
        cutoff: Slot,
        /// Reducer high-water mark
        latest_slot: Slot,
        /// Configured rollback buffer
        buffer: usize,
    },

    /// The upstream subscription of a root reducer ended.
    #[error("Upstream subscription for {reducer} closed")]
    UpstreamDisconnected {
        /// Root reducer
        reducer: String,
    },

    /// Reducer name not registered with the service.
    #[error("Unknown reducer: {0}")]
    UnknownReducer(String),

    /// Chain provider failure.
    #[error("Chain provider error: {0}")]
    Provider(#[from] ChainProviderError),

    /// Reducer state store failure.
    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    /// A root task panicked or was aborted.
    #[error("Sync task failed: {0}")]
    TaskFailed(String),
}

impl SyncError {
    /// Configuration errors are raised before any subscription opens.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SyncError::DuplicateReducer { .. }
                | SyncError::UnresolvedDependency { .. }
                | SyncError::DependencyCycle { .. }
                | SyncError::UnknownReducer(_)
        )
    }

    /// Retained history can no longer reconcile the chain.
    pub fn is_critical_node(&self) -> bool {
        matches!(self, SyncError::MassRollback { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_error_names_pair() {
        let err = SyncError::DependencyCycle {
            reducer: "A".to_string(),
            dependency: "B".to_string(),
        };
        assert_eq!(err.to_string(), "Dependency cycle: B depends back on A");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_mass_rollback_is_critical() {
        let err = SyncError::MassRollback {
            reducer: "Balances".to_string(),
            cutoff: 10,
            latest_slot: 5000,
            buffer: 100,
        };
        assert!(err.is_critical_node());
        assert!(!err.is_configuration());
        assert!(err.to_string().starts_with("Critical node"));
    }

    #[test]
    fn test_reducer_failure_display() {
        let err = SyncError::ReducerFailed {
            reducer: "Balances".to_string(),
            slot: 1200,
            action: "roll_forward",
            elapsed_ms: 3,
            source: ReducerError::Storage("disk full".to_string()),
        };
        let text = err.to_string();
        assert!(text.contains("Balances"));
        assert!(text.contains("1200"));
        assert!(text.contains("disk full"));
    }

    #[test]
    fn test_store_error_converts() {
        let err: SyncError = StoreError::Io("denied".to_string()).into();
        assert!(matches!(err, SyncError::Store(_)));
    }
}
