//! # Error Types
//!
//! Errors produced by the shared chain primitives.

use thiserror::Error;

/// Errors parsing a `Point` from its textual form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PointParseError {
    /// Neither `origin` nor `<slot>/<hash>`.
    #[error("Invalid point '{0}': expected 'origin' or '<slot>/<hash>'")]
    MissingSeparator(String),

    /// Slot component is not an unsigned integer.
    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    /// Hash component is empty.
    #[error("Point hash must not be empty")]
    EmptyHash,
}
