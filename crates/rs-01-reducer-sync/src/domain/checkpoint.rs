//! # Checkpoint Model
//!
//! `ReducerState` is the persisted row; `Checkpoint` is its in-memory mirror
//! owned by whichever task is currently applying events to the reducer;
//! `CheckpointSnapshot` is the immutable copy other tasks read.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::{Point, RollbackKind, Slot};

/// Bounded, ordered history of confirmed points.
///
/// Holds at most `capacity` points; inserting into a full set evicts the
/// oldest (lowest) point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntersectionSet {
    points: BTreeSet<Point>,
    capacity: usize,
}

impl IntersectionSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: BTreeSet::new(),
            capacity: capacity.max(1),
        }
    }

    /// Build from stored points, keeping only the newest `capacity` entries.
    pub fn from_points(points: impl IntoIterator<Item = Point>, capacity: usize) -> Self {
        let mut set = Self::new(capacity);
        for point in points {
            set.insert(point);
        }
        set
    }

    /// Add a point, returning the evicted oldest point if over capacity.
    pub fn insert(&mut self, point: Point) -> Option<Point> {
        self.points.insert(point);
        if self.points.len() > self.capacity {
            self.points.pop_first()
        } else {
            None
        }
    }

    /// Remove every point with `slot >= cutoff`. Returns how many were removed.
    pub fn remove_from(&mut self, cutoff: Slot) -> usize {
        // The empty hash sorts first, so this splits at the first point of `cutoff`.
        let removed = self.points.split_off(&Point::new(cutoff, ""));
        removed.len()
    }

    /// Newest point at or below `slot`.
    pub fn closest_at_or_below(&self, slot: Slot) -> Option<&Point> {
        match slot.checked_add(1) {
            Some(next) => self.points.range(..Point::new(next, "")).next_back(),
            None => self.points.last(),
        }
    }

    /// Most recent point.
    pub fn latest(&self) -> Option<&Point> {
        self.points.last()
    }

    /// Oldest retained point.
    pub fn oldest(&self) -> Option<&Point> {
        self.points.first()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Points ordered newest first.
    pub fn iter_desc(&self) -> impl Iterator<Item = &Point> {
        self.points.iter().rev()
    }

    /// Points ordered newest first, cloned.
    pub fn to_vec_desc(&self) -> Vec<Point> {
        self.iter_desc().cloned().collect()
    }
}

/// Persisted reducer state, one row per reducer name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReducerState {
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Where the reducer's next run resumes subscribing from.
    pub start_intersection: Point,
    /// Newest first, at most the configured rollback buffer long.
    pub latest_intersections: Vec<Point>,
}

impl ReducerState {
    /// Fresh row seeded at a bootstrap point.
    pub fn new(name: impl Into<String>, bootstrap: Point) -> Self {
        Self {
            name: name.into(),
            created_at: Utc::now(),
            start_intersection: bootstrap,
            latest_intersections: Vec::new(),
        }
    }

    /// Newest recorded point, if any.
    pub fn latest_point(&self) -> Option<&Point> {
        self.latest_intersections.iter().max()
    }

    /// Slot of the newest recorded point, or the start slot when empty.
    pub fn latest_slot(&self) -> Slot {
        self.latest_point()
            .map(|p| p.slot)
            .unwrap_or(self.start_intersection.slot)
    }
}

/// Immutable view of a reducer's checkpoint, published after every mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointSnapshot {
    pub start_intersection: Point,
    /// Newest first.
    pub latest_intersections: Vec<Point>,
}

impl CheckpointSnapshot {
    pub fn new(start_intersection: Point, latest_intersections: Vec<Point>) -> Self {
        Self {
            start_intersection,
            latest_intersections,
        }
    }

    pub fn latest_point(&self) -> Option<&Point> {
        self.latest_intersections.first()
    }

    /// Newest recorded point, falling back to the start intersection.
    pub fn own_latest_point(&self) -> &Point {
        self.latest_point().unwrap_or(&self.start_intersection)
    }

    pub fn latest_slot(&self) -> Slot {
        self.own_latest_point().slot
    }
}

/// In-memory checkpoint of a single reducer.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    name: String,
    created_at: DateTime<Utc>,
    start: Point,
    intersections: IntersectionSet,
}

impl Checkpoint {
    pub fn new(name: impl Into<String>, start: Point, capacity: usize) -> Self {
        Self {
            name: name.into(),
            created_at: Utc::now(),
            start,
            intersections: IntersectionSet::new(capacity),
        }
    }

    /// Load from a stored row, trimming history that exceeds `capacity`.
    pub fn from_state(state: ReducerState, capacity: usize) -> Self {
        Self {
            name: state.name,
            created_at: state.created_at,
            start: state.start_intersection,
            intersections: IntersectionSet::from_points(state.latest_intersections, capacity),
        }
    }

    pub fn to_state(&self) -> ReducerState {
        ReducerState {
            name: self.name.clone(),
            created_at: self.created_at,
            start_intersection: self.start.clone(),
            latest_intersections: self.intersections.to_vec_desc(),
        }
    }

    pub fn snapshot(&self) -> CheckpointSnapshot {
        CheckpointSnapshot::new(self.start.clone(), self.intersections.to_vec_desc())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_intersection(&self) -> &Point {
        &self.start
    }

    pub fn set_start_intersection(&mut self, point: Point) {
        self.start = point;
    }

    pub fn intersections(&self) -> &IntersectionSet {
        &self.intersections
    }

    pub fn latest_point(&self) -> Option<&Point> {
        self.intersections.latest()
    }

    /// Newest recorded point, falling back to the start intersection.
    pub fn own_latest_point(&self) -> &Point {
        self.latest_point().unwrap_or(&self.start)
    }

    pub fn latest_slot(&self) -> Slot {
        self.own_latest_point().slot
    }

    /// Record an applied block.
    pub fn record(&mut self, point: Point) -> Option<Point> {
        self.intersections.insert(point)
    }

    /// Drop every point at or above the cutoff of `target`. Returns the
    /// number of points removed.
    ///
    /// A start intersection at or above the cutoff is pulled back so
    /// replacement blocks pass the gate: to the newest remaining point, or
    /// to `target` when this rollback emptied the history. A reducer that
    /// never recorded anything keeps its bootstrap start.
    pub fn rollback(&mut self, target: &Point, kind: RollbackKind) -> usize {
        let cutoff = kind.cutoff_slot(target);
        let removed = self.intersections.remove_from(cutoff);
        if self.start.slot >= cutoff {
            match self.intersections.latest() {
                Some(latest) => self.start = latest.clone(),
                None if removed > 0 => self.start = target.clone(),
                None => {}
            }
        }
        removed
    }

    /// Move the resume cursor up to the newest recorded point.
    /// Returns true when the cursor changed.
    pub fn advance_start(&mut self) -> bool {
        match self.intersections.latest() {
            Some(latest) if *latest != self.start => {
                self.start = latest.clone();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(slot: Slot) -> Point {
        Point::new(slot, format!("hash{slot}"))
    }

    #[test]
    fn test_insert_evicts_oldest_when_full() {
        let mut set = IntersectionSet::new(3);
        assert_eq!(set.insert(p(10)), None);
        assert_eq!(set.insert(p(20)), None);
        assert_eq!(set.insert(p(30)), None);
        assert_eq!(set.insert(p(40)), Some(p(10)));

        assert_eq!(set.len(), 3);
        assert_eq!(set.oldest(), Some(&p(20)));
        assert_eq!(set.latest(), Some(&p(40)));
    }

    #[test]
    fn test_remove_from_is_inclusive_of_cutoff() {
        let mut set = IntersectionSet::from_points([p(10), p(20), p(30), p(40)], 10);

        assert_eq!(set.remove_from(30), 2);
        assert_eq!(set.to_vec_desc(), vec![p(20), p(10)]);
        assert_eq!(set.remove_from(100), 0);
    }

    #[test]
    fn test_closest_at_or_below() {
        let set = IntersectionSet::from_points([p(10), p(20), p(30)], 10);

        assert_eq!(set.closest_at_or_below(25), Some(&p(20)));
        assert_eq!(set.closest_at_or_below(20), Some(&p(20)));
        assert_eq!(set.closest_at_or_below(5), None);
        assert_eq!(set.closest_at_or_below(u64::MAX), Some(&p(30)));
    }

    #[test]
    fn test_from_points_keeps_newest() {
        let set = IntersectionSet::from_points((1..=10).map(p), 4);
        assert_eq!(set.to_vec_desc(), vec![p(10), p(9), p(8), p(7)]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut set = IntersectionSet::new(0);
        set.insert(p(1));
        set.insert(p(2));
        assert_eq!(set.capacity(), 1);
        assert_eq!(set.to_vec_desc(), vec![p(2)]);
    }

    #[test]
    fn test_state_latest_slot_falls_back_to_start() {
        let mut state = ReducerState::new("Balances", p(500));
        assert_eq!(state.latest_slot(), 500);

        state.latest_intersections = vec![p(900), p(800)];
        assert_eq!(state.latest_slot(), 900);
        assert_eq!(state.latest_point(), Some(&p(900)));
    }

    #[test]
    fn test_checkpoint_round_trips_through_state() {
        let mut checkpoint = Checkpoint::new("Balances", p(0), 5);
        checkpoint.record(p(1));
        checkpoint.record(p(2));

        let state = checkpoint.to_state();
        assert_eq!(state.latest_intersections, vec![p(2), p(1)]);

        let restored = Checkpoint::from_state(state, 5);
        assert_eq!(restored.latest_point(), Some(&p(2)));
        assert_eq!(restored.start_intersection(), &p(0));
    }

    #[test]
    fn test_rollback_clamps_start() {
        let mut checkpoint = Checkpoint::new("Balances", p(100), 10);
        for slot in [110, 120, 130] {
            checkpoint.record(p(slot));
        }
        checkpoint.advance_start();
        assert_eq!(checkpoint.start_intersection(), &p(130));

        assert_eq!(checkpoint.rollback(&p(115), RollbackKind::Inclusive), 2);
        assert_eq!(checkpoint.start_intersection(), &p(110));
        assert_eq!(checkpoint.latest_slot(), 110);
    }

    #[test]
    fn test_rollback_before_bootstrap_is_noop() {
        let mut checkpoint = Checkpoint::new("Balances", p(100), 10);

        assert_eq!(checkpoint.rollback(&p(50), RollbackKind::Exclusive), 0);
        assert_eq!(checkpoint.start_intersection(), &p(100));
    }

    #[test]
    fn test_rollback_emptying_history_rewinds_advanced_start() {
        let mut checkpoint = Checkpoint::new("Balances", p(0), 10);
        for slot in 1..=5 {
            checkpoint.record(p(slot));
        }
        checkpoint.advance_start();
        assert_eq!(checkpoint.start_intersection(), &p(5));

        assert_eq!(checkpoint.rollback(&Point::origin(), RollbackKind::Exclusive), 5);
        assert_eq!(checkpoint.start_intersection(), &Point::origin());
        assert!(checkpoint.latest_point().is_none());
    }

    #[test]
    fn test_rollback_below_retained_history_rewinds_to_target() {
        let mut checkpoint = Checkpoint::new("Balances", p(0), 3);
        for slot in [21, 22, 23] {
            checkpoint.record(p(slot));
        }
        checkpoint.advance_start();

        assert_eq!(checkpoint.rollback(&p(10), RollbackKind::Exclusive), 3);
        assert_eq!(checkpoint.start_intersection(), &p(10));
    }

    #[test]
    fn test_snapshot_own_latest_point() {
        let mut checkpoint = Checkpoint::new("Balances", p(7), 10);
        assert_eq!(checkpoint.snapshot().own_latest_point(), &p(7));

        checkpoint.record(p(9));
        let snapshot = checkpoint.snapshot();
        assert_eq!(snapshot.own_latest_point(), &p(9));
        assert_eq!(snapshot.latest_slot(), 9);
    }

    #[test]
    fn test_state_serializes_as_ordered_list() {
        let mut checkpoint = Checkpoint::new("Balances", p(0), 5);
        checkpoint.record(p(3));
        checkpoint.record(p(4));

        let json = serde_json::to_value(checkpoint.to_state()).unwrap();
        assert_eq!(json["latest_intersections"][0]["slot"], 4);
        assert_eq!(json["latest_intersections"][1]["slot"], 3);
    }
}
