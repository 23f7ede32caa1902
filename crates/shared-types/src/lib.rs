//! # Shared Types Crate
//!
//! Chain primitives exchanged between the chain provider, the reducer sync
//! core and the runtime.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: `Point`, `Block` and `NextResponse` are
//!   defined once here and never redefined by a provider or reducer.
//! - **Decoded Blocks Only**: wire decoding (including era tagging) belongs to
//!   the provider; everything in this crate is already decoded.

pub mod chain_sync;
pub mod entities;
pub mod errors;

pub use chain_sync::*;
pub use entities::*;
pub use errors::*;
