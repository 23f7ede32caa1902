//! # Chain-Sync Responses
//!
//! The events a chain provider yields on a subscription.

use serde::{Deserialize, Serialize};

use crate::entities::{Block, Point, Slot};

/// How a rollback target is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RollbackKind {
    /// The target point stays valid; everything strictly after it is undone.
    #[default]
    Exclusive,
    /// The target point itself is undone as well.
    Inclusive,
}

impl RollbackKind {
    /// First slot that must be undone when rolling back to `point`.
    ///
    /// Exclusive rollbacks keep `point`, so the cutoff is the next slot.
    pub fn cutoff_slot(&self, point: &Point) -> Slot {
        match self {
            RollbackKind::Exclusive => point.slot.saturating_add(1),
            RollbackKind::Inclusive => point.slot,
        }
    }
}

/// One event from a chain-sync subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NextResponse {
    /// The provider is at the tip and waiting for a new block.
    Await,
    /// Apply a new block.
    RollForward { block: Block },
    /// Undo history back to `point`.
    RollBack {
        point: Point,
        #[serde(default)]
        kind: RollbackKind,
    },
}

impl NextResponse {
    /// Short action label used in log lines.
    pub fn action(&self) -> &'static str {
        match self {
            NextResponse::Await => "await",
            NextResponse::RollForward { .. } => "roll_forward",
            NextResponse::RollBack { .. } => "roll_back",
        }
    }

    /// Slot the event refers to, if any.
    pub fn slot(&self) -> Option<Slot> {
        match self {
            NextResponse::Await => None,
            NextResponse::RollForward { block } => Some(block.slot()),
            NextResponse::RollBack { point, .. } => Some(point.slot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive_cutoff_keeps_point() {
        let point = Point::new(100, "h100");
        assert_eq!(RollbackKind::Exclusive.cutoff_slot(&point), 101);
    }

    #[test]
    fn test_inclusive_cutoff_drops_point() {
        let point = Point::new(100, "h100");
        assert_eq!(RollbackKind::Inclusive.cutoff_slot(&point), 100);
    }

    #[test]
    fn test_exclusive_cutoff_saturates() {
        let point = Point::new(u64::MAX, "end");
        assert_eq!(RollbackKind::Exclusive.cutoff_slot(&point), u64::MAX);
    }

    #[test]
    fn test_json_shape() {
        let rollback: NextResponse = serde_json::from_str(
            r#"{"action":"roll_back","point":{"slot":5,"hash":"aa"},"kind":"inclusive"}"#,
        )
        .unwrap();
        assert_eq!(
            rollback,
            NextResponse::RollBack {
                point: Point::new(5, "aa"),
                kind: RollbackKind::Inclusive
            }
        );

        let forward: NextResponse =
            serde_json::from_str(r#"{"action":"roll_forward","block":{"slot":6,"hash":"bb"}}"#)
                .unwrap();
        assert_eq!(forward.slot(), Some(6));
        assert_eq!(forward.action(), "roll_forward");

        let idle: NextResponse = serde_json::from_str(r#"{"action":"await"}"#).unwrap();
        assert_eq!(idle, NextResponse::Await);
        assert_eq!(idle.slot(), None);
    }

    #[test]
    fn test_rollback_kind_defaults_to_exclusive() {
        let rollback: NextResponse =
            serde_json::from_str(r#"{"action":"roll_back","point":{"slot":5,"hash":"aa"}}"#)
                .unwrap();
        assert!(matches!(
            rollback,
            NextResponse::RollBack {
                kind: RollbackKind::Exclusive,
                ..
            }
        ));
    }
}
