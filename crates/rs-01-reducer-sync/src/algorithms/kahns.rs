//! Kahn's Topological Sort Algorithm
//!
//! O(V + E), detects cycles, deterministic: ready reducers are taken in name
//! order.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::errors::SyncError;

/// Order reducers so every dependency comes before its dependents.
///
/// `dependencies` maps each reducer to its direct dependencies; every
/// dependency must itself be a key.
pub fn kahns_topological_sort(
    dependencies: &BTreeMap<String, Vec<String>>,
) -> Result<Vec<String>, SyncError> {
    // 1. In-degree = number of unresolved dependencies
    let mut in_degree: BTreeMap<&str, usize> = dependencies
        .iter()
        .map(|(name, deps)| (name.as_str(), deps.len()))
        .collect();

    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (name, deps) in dependencies {
        for dep in deps {
            dependents.entry(dep.as_str()).or_default().push(name.as_str());
        }
    }

    // 2. Ready set ordered by name for determinism
    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(name, _)| *name)
        .collect();

    let mut order = Vec::with_capacity(dependencies.len());

    while let Some(node) = ready.pop_first() {
        order.push(node.to_string());

        let Some(children) = dependents.get(node) else {
            continue;
        };
        for child in children {
            let Some(degree) = in_degree.get_mut(child) else {
                continue;
            };
            *degree = degree.saturating_sub(1);
            if *degree == 0 {
                ready.insert(*child);
            }
        }
    }

    // 3. Anything left unscheduled sits on a cycle
    if order.len() < dependencies.len() {
        let scheduled: BTreeSet<&str> = order.iter().map(String::as_str).collect();
        let (reducer, deps) = dependencies
            .iter()
            .find(|(name, _)| !scheduled.contains(name.as_str()))
            .ok_or_else(|| SyncError::TaskFailed("topological sort lost a node".to_string()))?;
        let dependency = deps
            .iter()
            .find(|dep| !scheduled.contains(dep.as_str()))
            .cloned()
            .unwrap_or_else(|| reducer.clone());
        return Err(SyncError::DependencyCycle {
            reducer: reducer.clone(),
            dependency,
        });
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        edges
            .iter()
            .map(|(name, deps)| {
                (
                    name.to_string(),
                    deps.iter().map(|d| d.to_string()).collect(),
                )
            })
            .collect()
    }

    /// C depends on B depends on A
    #[test]
    fn test_simple_chain() {
        let order = kahns_topological_sort(&graph(&[("C", &["B"]), ("B", &["A"]), ("A", &[])]))
            .unwrap();
        assert_eq!(order, vec!["A", "B", "C"]);
    }

    ///     A
    ///    / \
    ///   B   C
    ///    \ /
    ///     D
    #[test]
    fn test_diamond() {
        let order = kahns_topological_sort(&graph(&[
            ("A", &[]),
            ("B", &["A"]),
            ("C", &["A"]),
            ("D", &["B", "C"]),
        ]))
        .unwrap();
        assert_eq!(order, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_independent_reducers_sorted_by_name() {
        let order =
            kahns_topological_sort(&graph(&[("Zeta", &[]), ("Alpha", &[]), ("Mid", &[])])).unwrap();
        assert_eq!(order, vec!["Alpha", "Mid", "Zeta"]);
    }

    #[test]
    fn test_cycle_detected() {
        let result =
            kahns_topological_sort(&graph(&[("A", &["C"]), ("B", &["A"]), ("C", &["B"])]));
        assert!(matches!(result, Err(SyncError::DependencyCycle { .. })));
    }

    #[test]
    fn test_empty_graph() {
        assert!(kahns_topological_sort(&BTreeMap::new()).unwrap().is_empty());
    }
}
