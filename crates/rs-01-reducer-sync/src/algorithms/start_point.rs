//! Start-Point Normalizer
//!
//! Runs once at startup, after the graph is built and every row is loaded.
//! Walks reducers in topological order so a dependency is normalized before
//! any of its dependents reads it.

use std::collections::HashMap;

use shared_types::Point;

use crate::domain::checkpoint::Checkpoint;
use crate::domain::entities::DependencyGraph;
use crate::domain::value_objects::StartPointChange;

/// Pull each dependent's start intersection up to its dependencies'
/// frontier.
///
/// The frontier of a reducer is the minimum, over its dependencies, of each
/// dependency's newest recorded point (the origin when a dependency has no
/// history). A start intersection behind the frontier is moved to it; one
/// ahead of it is left alone. Root reducers are never touched.
///
/// Returns every change made, in the order applied.
pub fn initialize_all_reducer_states(
    graph: &DependencyGraph,
    checkpoints: &mut HashMap<String, Checkpoint>,
) -> Vec<StartPointChange> {
    let mut changes = Vec::new();

    for name in graph.topological_order() {
        let dependencies = graph.dependencies(name);
        if dependencies.is_empty() {
            continue;
        }

        let frontier = dependencies
            .iter()
            .map(|dep| {
                checkpoints
                    .get(dep)
                    .and_then(|checkpoint| checkpoint.latest_point().cloned())
                    .unwrap_or_else(Point::origin)
            })
            .min_by_key(|point| point.slot);

        let (Some(frontier), Some(checkpoint)) = (frontier, checkpoints.get_mut(name)) else {
            continue;
        };

        if frontier.slot > checkpoint.start_intersection().slot {
            let from = checkpoint.start_intersection().clone();
            checkpoint.set_start_intersection(frontier.clone());
            changes.push(StartPointChange {
                reducer: name.clone(),
                from,
                to: frontier,
            });
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::build_dependency_graph;

    fn p(slot: u64) -> Point {
        Point::new(slot, format!("hash{slot}"))
    }

    fn graph(decls: &[(&str, &[&str])]) -> DependencyGraph {
        build_dependency_graph(
            decls
                .iter()
                .map(|(n, ds)| (n.to_string(), ds.iter().map(|d| d.to_string()).collect())),
        )
        .unwrap()
    }

    fn checkpoint(name: &str, start: Point, recorded: &[u64]) -> (String, Checkpoint) {
        let mut cp = Checkpoint::new(name, start, 100);
        for slot in recorded {
            cp.record(p(*slot));
        }
        (name.to_string(), cp)
    }

    #[test]
    fn test_dependent_catches_up_to_dependency() {
        let graph = graph(&[("D", &[]), ("R", &["D"])]);
        let mut checkpoints: HashMap<_, _> = [
            checkpoint("D", Point::origin(), &[500, 750, 1000]),
            checkpoint("R", Point::origin(), &[]),
        ]
        .into_iter()
        .collect();

        let changes = initialize_all_reducer_states(&graph, &mut checkpoints);

        assert_eq!(checkpoints["R"].start_intersection(), &Point::new(1000, "hash1000"));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].from, Point::origin());
    }

    #[test]
    fn test_fresh_bootstrap_is_noop() {
        let graph = graph(&[("D", &[]), ("R", &["D"])]);
        let mut checkpoints: HashMap<_, _> = [
            checkpoint("D", p(5000), &[]),
            checkpoint("R", p(5000), &[]),
        ]
        .into_iter()
        .collect();

        let changes = initialize_all_reducer_states(&graph, &mut checkpoints);

        assert!(changes.is_empty());
        assert_eq!(checkpoints["D"].start_intersection(), &p(5000));
        assert_eq!(checkpoints["R"].start_intersection(), &p(5000));
    }

    #[test]
    fn test_dependent_ahead_is_left_alone() {
        let graph = graph(&[("D", &[]), ("R", &["D"])]);
        let mut checkpoints: HashMap<_, _> = [
            checkpoint("D", Point::origin(), &[100]),
            checkpoint("R", p(400), &[]),
        ]
        .into_iter()
        .collect();

        assert!(initialize_all_reducer_states(&graph, &mut checkpoints).is_empty());
        assert_eq!(checkpoints["R"].start_intersection(), &p(400));
    }

    #[test]
    fn test_chain_normalizes_in_order() {
        // C depends on B which depends on A; B's new start does not feed C,
        // only B's recorded history does.
        let graph = graph(&[("A", &[]), ("B", &["A"]), ("C", &["B"])]);
        let mut checkpoints: HashMap<_, _> = [
            checkpoint("A", Point::origin(), &[900]),
            checkpoint("B", Point::origin(), &[300]),
            checkpoint("C", Point::origin(), &[]),
        ]
        .into_iter()
        .collect();

        initialize_all_reducer_states(&graph, &mut checkpoints);

        assert_eq!(checkpoints["B"].start_intersection(), &p(900));
        assert_eq!(checkpoints["C"].start_intersection(), &p(300));
    }

    #[test]
    fn test_several_dependencies_use_slowest() {
        let graph = graph(&[("A", &[]), ("B", &[]), ("R", &["A", "B"])]);
        let mut checkpoints: HashMap<_, _> = [
            checkpoint("A", Point::origin(), &[900]),
            checkpoint("B", Point::origin(), &[600]),
            checkpoint("R", Point::origin(), &[]),
        ]
        .into_iter()
        .collect();

        initialize_all_reducer_states(&graph, &mut checkpoints);
        assert_eq!(checkpoints["R"].start_intersection(), &p(600));
    }
}
