//! # Core Chain Entities
//!
//! Positions on the chain and the decoded blocks delivered by a provider.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::PointParseError;

/// Absolute slot number.
pub type Slot = u64;

/// A position on the chain: a `(slot, hash)` pair.
///
/// Points are totally ordered by slot; ties are broken by hash so that sorted
/// collections of points are deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Point {
    /// Slot of the block this point identifies.
    pub slot: Slot,
    /// Hex-encoded block hash. Empty for the origin.
    pub hash: String,
}

impl Point {
    /// Create a new point.
    pub fn new(slot: Slot, hash: impl Into<String>) -> Self {
        Self {
            slot,
            hash: hash.into(),
        }
    }

    /// The origin of the chain (slot 0, no hash).
    pub fn origin() -> Self {
        Self::default()
    }

    /// True when this point is the chain origin.
    pub fn is_origin(&self) -> bool {
        self.slot == 0 && self.hash.is_empty()
    }
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> Ordering {
        self.slot
            .cmp(&other.slot)
            .then_with(|| self.hash.cmp(&other.hash))
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_origin() {
            write!(f, "origin")
        } else {
            write!(f, "{}/{}", self.slot, self.hash)
        }
    }
}

/// Parses `"origin"` or `"<slot>/<hash>"`.
impl FromStr for Point {
    type Err = PointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("origin") {
            return Ok(Point::origin());
        }
        let (slot, hash) = s
            .split_once('/')
            .ok_or_else(|| PointParseError::MissingSeparator(s.to_string()))?;
        let slot = slot
            .parse::<Slot>()
            .map_err(|_| PointParseError::InvalidSlot(slot.to_string()))?;
        if hash.is_empty() {
            return Err(PointParseError::EmptyHash);
        }
        Ok(Point::new(slot, hash))
    }
}

/// Ledger era a block was produced in. Tagged by the provider while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Era {
    Byron,
    Shelley,
    Allegra,
    Mary,
    Alonzo,
    Babbage,
    #[default]
    Conway,
}

/// A decoded transaction body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBody {
    /// Hex-encoded transaction id.
    pub id: String,
    /// Raw CBOR of the body, kept for reducers that need more than the id.
    #[serde(default)]
    pub raw: Vec<u8>,
}

impl TransactionBody {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            raw: Vec::new(),
        }
    }
}

/// A decoded block as delivered by a chain provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    slot: Slot,
    hash: String,
    #[serde(default)]
    era: Era,
    #[serde(default)]
    transactions: Vec<TransactionBody>,
}

impl Block {
    pub fn new(slot: Slot, hash: impl Into<String>) -> Self {
        Self {
            slot,
            hash: hash.into(),
            era: Era::default(),
            transactions: Vec::new(),
        }
    }

    pub fn with_era(mut self, era: Era) -> Self {
        self.era = era;
        self
    }

    pub fn with_transactions(mut self, transactions: Vec<TransactionBody>) -> Self {
        self.transactions = transactions;
        self
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn era(&self) -> Era {
        self.era
    }

    /// Transaction bodies in block order.
    pub fn transactions(&self) -> &[TransactionBody] {
        &self.transactions
    }

    /// The chain position of this block.
    pub fn point(&self) -> Point {
        Point::new(self.slot, self.hash.clone())
    }
}
