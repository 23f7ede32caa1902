//! Dependency Graph Builder
//!
//! Resolves declared dependencies, rejects cycles and produces the
//! topologically ordered `DependencyGraph`. Any error here is a
//! configuration error: the service must not start.

use std::collections::{BTreeMap, BTreeSet};

use crate::algorithms::kahns::kahns_topological_sort;
use crate::domain::entities::DependencyGraph;
use crate::domain::errors::SyncError;

/// Build the dependency graph from `(reducer, declared dependencies)` pairs.
pub fn build_dependency_graph<I>(declarations: I) -> Result<DependencyGraph, SyncError>
where
    I: IntoIterator<Item = (String, Vec<String>)>,
{
    // 1. Collect, rejecting duplicate names
    let mut dependencies: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, declared) in declarations {
        if dependencies.contains_key(&name) {
            return Err(SyncError::DuplicateReducer { name });
        }
        let mut unique = Vec::with_capacity(declared.len());
        for dep in declared {
            if !unique.contains(&dep) {
                unique.push(dep);
            }
        }
        dependencies.insert(name, unique);
    }

    // 2. Every dependency must be an active reducer, never the reducer itself
    for (name, deps) in &dependencies {
        for dep in deps {
            if dep == name {
                return Err(SyncError::DependencyCycle {
                    reducer: name.clone(),
                    dependency: dep.clone(),
                });
            }
            if !dependencies.contains_key(dep) {
                return Err(SyncError::UnresolvedDependency {
                    reducer: name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    // 3. No transitive dependency of R may declare R as a dependency
    for name in dependencies.keys() {
        if let Some(offender) = find_cycle_through(name, &dependencies) {
            return Err(SyncError::DependencyCycle {
                reducer: name.clone(),
                dependency: offender,
            });
        }
    }

    // 4. Order and reverse edges
    let topological_order = kahns_topological_sort(&dependencies)?;

    let mut dependents: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, deps) in &dependencies {
        for dep in deps {
            dependents.entry(dep.clone()).or_default().push(name.clone());
        }
    }

    Ok(DependencyGraph {
        dependencies,
        dependents,
        topological_order,
    })
}

/// First transitive dependency of `root` that lists `root` as its own
/// dependency.
fn find_cycle_through(root: &str, dependencies: &BTreeMap<String, Vec<String>>) -> Option<String> {
    let mut visited: BTreeSet<&str> = BTreeSet::new();
    let mut stack: Vec<&str> = dependencies
        .get(root)
        .map(|deps| deps.iter().map(String::as_str).collect())
        .unwrap_or_default();

    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        let deps = dependencies.get(current)?;
        if deps.iter().any(|dep| dep == root) {
            return Some(current.to_string());
        }
        stack.extend(deps.iter().map(String::as_str));
    }

    None
}
