//! # Application Module
//!
//! The reducer sync service: startup, per-block forwarding, rollback
//! cascade, periodic flush and one subscription task per root reducer.

mod handle;
pub mod service;
mod sync_loop;

pub use service::ReducerSyncService;
