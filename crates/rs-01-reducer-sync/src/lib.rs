//! # RS-01 Reducer Sync
//!
//! Orchestrates independent reducers over a single chain-sync feed.
//!
//! **Subsystem ID:** 01
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Each reducer maintains its own materialized view and resume checkpoint.
//! This crate decides where every reducer resumes, opens one upstream
//! subscription per *root* reducer, forwards every block to the reducers that
//! depend on it, and cascades rollbacks through the dependency graph.
//!
//! ## Guarantees
//!
//! | Guarantee | Mechanism |
//! |-----------|-----------|
//! | No dependency cycles | Graph builder rejects direct and indirect cycles |
//! | Dependents never outrun dependencies | Per-block gate against each dependency's frontier |
//! | Resuming never skips a slow dependent | Safe intersection = slowest transitive dependent |
//! | Bounded upstream connections | One provider per root reducer |
//! | Bounded history | Rollbacks deeper than the buffer abort the process |
//!
//! ## Module Structure
//!
//! ```text
//! rs-01-reducer-sync/
//! ├── domain/          # Checkpoints, dependency graph, errors, gate
//! ├── algorithms/      # Graph builder, Kahn's sort, start points, safe intersection, rollback
//! ├── ports/           # ReducerSyncApi (inbound) + Reducer, ChainProvider, ReducerStateStore (outbound)
//! ├── application/     # ReducerSyncService: initialization, forwarding, flush, root tasks
//! ├── adapters/        # In-memory chain, state store and recording reducer
//! └── config.rs        # SyncConfig
//! ```

#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use adapters::{MemoryChain, MemoryStateStore, RecordingReducer};
pub use algorithms::{
    build_dependency_graph, check_rollback_depth, initialize_all_reducer_states,
    kahns_topological_sort, safe_intersection_points,
};
pub use application::ReducerSyncService;
pub use config::SyncConfig;
pub use domain::{
    reducer_name, should_process_block, Checkpoint, CheckpointSnapshot, ChainProviderError,
    DependencyGraph, IntersectionSet, ReducerError, ReducerState, StartPointChange, StoreError,
    SyncError, SyncPhase,
};
pub use ports::{
    ChainProvider, ChainProviderFactory, NextResponseStream, Reducer, ReducerStateStore,
    ReducerSyncApi,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
