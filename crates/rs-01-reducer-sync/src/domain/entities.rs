//! Dependency graph among reducers
//!
//! Edges point from a dependent to its dependency. The graph is always
//! acyclic: it is only produced by `build_dependency_graph`.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Dependency graph for reducer scheduling.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// reducer -> its direct dependencies
    pub(crate) dependencies: BTreeMap<String, Vec<String>>,
    /// reducer -> reducers that directly depend on it
    pub(crate) dependents: BTreeMap<String, Vec<String>>,
    /// Dependencies before dependents, ties broken by name
    pub(crate) topological_order: Vec<String>,
}

impl DependencyGraph {
    /// Direct dependencies of `name`.
    pub fn dependencies(&self, name: &str) -> &[String] {
        self.dependencies
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Reducers that directly depend on `name`.
    pub fn direct_dependents(&self, name: &str) -> &[String] {
        self.dependents.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every reducer that depends on `name` directly or through a chain,
    /// in topological order.
    pub fn transitive_dependents(&self, name: &str) -> Vec<String> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([name]);

        while let Some(current) = queue.pop_front() {
            for dependent in self.direct_dependents(current) {
                if seen.insert(dependent.as_str()) {
                    queue.push_back(dependent.as_str());
                }
            }
        }

        self.topological_order
            .iter()
            .filter(|candidate| seen.contains(candidate.as_str()))
            .cloned()
            .collect()
    }

    /// Reducers with no declared dependency, in topological order.
    pub fn root_reducers(&self) -> Vec<String> {
        self.topological_order
            .iter()
            .filter(|name| self.dependencies(name).is_empty())
            .cloned()
            .collect()
    }

    pub fn topological_order(&self) -> &[String] {
        &self.topological_order
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dependencies.contains_key(name)
    }

    pub fn is_root(&self, name: &str) -> bool {
        self.contains(name) && self.dependencies(name).is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.dependencies.len()
    }

    pub fn edge_count(&self) -> usize {
        self.dependencies.values().map(Vec::len).sum()
    }
}
