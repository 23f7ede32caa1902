//! # Value Objects
//!
//! Small immutable types used across the sync core.

use std::fmt;

use shared_types::Point;

/// Lifecycle of a root reducer's subscription task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    /// Opening the provider and the subscription.
    Connecting,
    /// Waiting for the next event.
    Syncing,
    /// Applying a block across the lineage.
    RollingForward,
    /// Applying a rollback across the lineage.
    RollingBack,
    /// Task finished.
    Stopped,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Connecting => "connecting",
            SyncPhase::Syncing => "syncing",
            SyncPhase::RollingForward => "rolling_forward",
            SyncPhase::RollingBack => "rolling_back",
            SyncPhase::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A start intersection moved by startup normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartPointChange {
    pub reducer: String,
    pub from: Point,
    pub to: Point,
}

/// Stable reducer name for a type: module path and generic parameters
/// stripped.
///
/// `indexer::reducers::BalanceReducer<indexer::Ctx>` becomes `BalanceReducer`.
pub fn reducer_name<T: ?Sized>() -> String {
    strip_type_name(std::any::type_name::<T>())
}

pub(crate) fn strip_type_name(type_name: &str) -> String {
    let without_generics = type_name.split('<').next().unwrap_or(type_name);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BalanceReducer<T>(std::marker::PhantomData<T>);
    struct Ctx;

    #[test]
    fn test_reducer_name_strips_path_and_generics() {
        assert_eq!(reducer_name::<BalanceReducer<Ctx>>(), "BalanceReducer");
        assert_eq!(reducer_name::<Ctx>(), "Ctx");
    }

    #[test]
    fn test_strip_type_name() {
        assert_eq!(
            strip_type_name("a::b::PriceReducer<a::Db, b::Other<c::X>>"),
            "PriceReducer"
        );
        assert_eq!(strip_type_name("Plain"), "Plain");
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(SyncPhase::RollingBack.to_string(), "rolling_back");
    }
}
