//! Safe Intersection Calculator
//!
//! Where a root subscription may resume without skipping blocks any of its
//! dependents still need.

use std::sync::Arc;

use shared_types::Point;

use crate::domain::checkpoint::CheckpointSnapshot;
use crate::domain::entities::DependencyGraph;

/// Resume points for `name`, newest first.
///
/// Without transitive dependents this is the reducer's own latest
/// intersections. Otherwise it is a single point: the lowest-slot
/// `own_latest_point` among the reducer and all its transitive dependents,
/// carrying that reducer's own hash.
///
/// Reducers missing from `lookup` are ignored.
pub fn safe_intersection_points<F>(graph: &DependencyGraph, name: &str, lookup: F) -> Vec<Point>
where
    F: Fn(&str) -> Option<Arc<CheckpointSnapshot>>,
{
    let dependents = graph.transitive_dependents(name);

    if dependents.is_empty() {
        return lookup(name)
            .map(|snapshot| snapshot.latest_intersections.clone())
            .unwrap_or_default();
    }

    std::iter::once(name)
        .chain(dependents.iter().map(String::as_str))
        .filter_map(|reducer| lookup(reducer).map(|s| s.own_latest_point().clone()))
        .min_by_key(|point| point.slot)
        .into_iter()
        .collect()
}
