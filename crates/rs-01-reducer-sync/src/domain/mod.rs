//! Domain module for Reducer Sync
//!
//! Contains the checkpoint model, dependency graph, errors, invariants and
//! value objects.

pub mod checkpoint;
pub mod entities;
pub mod errors;
pub mod invariants;
pub mod value_objects;

pub use checkpoint::*;
pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use value_objects::*;
