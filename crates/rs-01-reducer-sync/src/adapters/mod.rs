//! # Adapters Layer (Hexagonal Architecture)
//!
//! In-memory implementations of the outbound ports. Used by the test
//! suites and by embedders that keep their views in memory.

mod memory_chain;
mod memory_reducer;
mod memory_store;

pub use memory_chain::MemoryChain;
pub use memory_reducer::RecordingReducer;
pub use memory_store::MemoryStateStore;
