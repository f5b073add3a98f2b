//! Package graph builder using petgraph.
//!
//! Edges point from a dependency to its dependent, so a topological walk
//! visits dependencies first. Cycles are tolerated: strongly connected
//! components are condensed and their members share a batch.

use crate::{Batches, Error, PackageNodeData, Result};
use petgraph::Direction;
use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::cmp::Reverse;
use std::collections::HashMap;
use tracing::{debug, warn};

/// A node in the package graph.
#[derive(Debug, Clone)]
pub struct GraphNode<T> {
    /// Name of the package.
    pub name: String,
    /// The package data.
    pub package: T,
    /// Position of the package in discovery order.
    pub order: usize,
}

/// Package graph for dependency resolution and batch ordering.
pub struct PackageGraph<T: PackageNodeData> {
    /// The directed graph of packages (dependency -> dependent).
    graph: DiGraph<GraphNode<T>, ()>,
    /// Map from package names to node indices.
    name_to_node: HashMap<String, NodeIndex>,
}

impl<T: PackageNodeData> Default for PackageGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PackageNodeData> PackageGraph<T> {
    /// Create a new empty package graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            name_to_node: HashMap::new(),
        }
    }

    /// Build a fully wired graph from a package set in discovery order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicatePackage`] if two packages share a name.
    pub fn from_packages(packages: impl IntoIterator<Item = T>) -> Result<Self> {
        let mut graph = Self::new();
        for package in packages {
            graph.add_package(package)?;
        }
        graph.add_dependency_edges();
        Ok(graph)
    }

    /// Add a single package to the graph.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicatePackage`] if a package with the same name exists.
    pub fn add_package(&mut self, package: T) -> Result<NodeIndex> {
        let name = package.name().to_string();
        if self.name_to_node.contains_key(&name) {
            return Err(Error::DuplicatePackage { name });
        }

        let order = self.graph.node_count();
        let node_index = self.graph.add_node(GraphNode {
            name: name.clone(),
            package,
            order,
        });
        debug!("Added package node '{}'", name);
        self.name_to_node.insert(name, node_index);

        Ok(node_index)
    }

    /// Wire dependency edges after all packages have been added.
    ///
    /// External dependencies (names not in the graph) and self-dependencies
    /// are skipped. Returns the number of edges in the graph.
    pub fn add_dependency_edges(&mut self) -> usize {
        let mut edges_to_add = Vec::new();

        for node_index in self.graph.node_indices() {
            let node = &self.graph[node_index];
            for dep_name in node.package.dependency_names() {
                if dep_name == node.name {
                    continue;
                }
                if let Some(&dep_index) = self.name_to_node.get(dep_name) {
                    edges_to_add.push((dep_index, node_index));
                }
            }
        }

        for (from, to) in edges_to_add {
            self.graph.update_edge(from, to, ());
        }

        self.graph.edge_count()
    }

    /// Check if the graph has cycles.
    #[must_use]
    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Names of the packages in each dependency cycle, sorted by discovery order.
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<String>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|mut component| {
                component.sort_by_key(|idx| self.graph[*idx].order);
                component
                    .into_iter()
                    .map(|idx| self.graph[idx].name.clone())
                    .collect()
            })
            .collect()
    }

    /// Number of same-workspace packages that depend on `name`.
    #[must_use]
    pub fn dependents_count(&self, name: &str) -> usize {
        self.name_to_node
            .get(name)
            .map_or(0, |&idx| self.dependents_of(idx))
    }

    fn dependents_of(&self, idx: NodeIndex) -> usize {
        self.graph
            .neighbors_directed(idx, Direction::Outgoing)
            .count()
    }

    /// Order packages into batches.
    ///
    /// Batch 0 holds every package without same-workspace dependencies;
    /// batch N holds packages whose dependencies all live in batches `< N`.
    /// Members of a dependency cycle are placed together in the first batch
    /// where all of the cycle's outside prerequisites are satisfied.
    ///
    /// Within a batch, packages are sorted by descending priority, then by
    /// descending dependent count, then by discovery order.
    #[must_use]
    pub fn batches(&self) -> Batches<T> {
        if self.graph.node_count() == 0 {
            return vec![];
        }

        // tarjan_scc yields components in reverse topological order
        let mut components = tarjan_scc(&self.graph);
        components.reverse();

        let mut component_of = HashMap::new();
        for (component_idx, component) in components.iter().enumerate() {
            for &node in component {
                component_of.insert(node, component_idx);
            }
            if component.len() > 1 {
                let names: Vec<&str> = component
                    .iter()
                    .map(|idx| self.graph[*idx].name.as_str())
                    .collect();
                warn!(
                    packages = ?names,
                    "Dependency cycle detected; packages will share a batch without ordering"
                );
            }
        }

        let mut levels = vec![0usize; components.len()];
        for (component_idx, component) in components.iter().enumerate() {
            let mut level = 0;
            for &node in component {
                for edge in self.graph.edges_directed(node, Direction::Incoming) {
                    let dep_component = component_of[&edge.source()];
                    if dep_component != component_idx {
                        level = level.max(levels[dep_component] + 1);
                    }
                }
            }
            levels[component_idx] = level;
        }

        let depth = levels.iter().copied().max().map_or(0, |max| max + 1);
        let mut batches: Vec<Vec<NodeIndex>> = vec![Vec::new(); depth];
        for (component_idx, component) in components.iter().enumerate() {
            batches[levels[component_idx]].extend(component.iter().copied());
        }

        batches
            .into_iter()
            .map(|mut batch| {
                batch.sort_by_key(|&idx| {
                    let node = &self.graph[idx];
                    (
                        Reverse(node.package.priority()),
                        Reverse(self.dependents_of(idx)),
                        node.order,
                    )
                });
                batch
                    .into_iter()
                    .map(|idx| self.graph[idx].clone())
                    .collect()
            })
            .collect()
    }

    /// Get the number of packages in the graph.
    #[must_use]
    pub fn package_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Check if a package exists in the graph.
    #[must_use]
    pub fn contains_package(&self, name: &str) -> bool {
        self.name_to_node.contains_key(name)
    }

    /// Get a reference to a package node by name.
    #[must_use]
    pub fn get_node_by_name(&self, name: &str) -> Option<&GraphNode<T>> {
        self.name_to_node
            .get(name)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    /// Names of the same-workspace packages `name` depends on directly.
    #[must_use]
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        let Some(&idx) = self.name_to_node.get(name) else {
            return vec![];
        };
        let mut deps: Vec<&GraphNode<T>> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|dep| &self.graph[dep])
            .collect();
        deps.sort_by_key(|node| node.order);
        deps.into_iter().map(|node| node.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Default)]
    struct TestPackage {
        name: String,
        deps: Vec<String>,
        priority: i64,
    }

    impl TestPackage {
        fn new(name: &str, deps: &[&str]) -> Self {
            Self {
                name: name.to_string(),
                deps: deps.iter().map(|s| (*s).to_string()).collect(),
                priority: 0,
            }
        }

        fn with_priority(mut self, priority: i64) -> Self {
            self.priority = priority;
            self
        }
    }

    impl PackageNodeData for TestPackage {
        fn name(&self) -> &str {
            &self.name
        }

        fn dependency_names(&self) -> impl Iterator<Item = &str> {
            self.deps.iter().map(String::as_str)
        }

        fn priority(&self) -> i64 {
            self.priority
        }
    }

    fn batch_names(graph: &PackageGraph<TestPackage>) -> Vec<Vec<String>> {
        graph
            .batches()
            .into_iter()
            .map(|batch| batch.into_iter().map(|node| node.name).collect())
            .collect()
    }

    #[test]
    fn test_empty_graph_has_no_batches() {
        let graph: PackageGraph<TestPackage> = PackageGraph::new();
        assert_eq!(graph.package_count(), 0);
        assert!(graph.batches().is_empty());
    }

    #[test]
    fn test_duplicate_package_rejected() {
        let result = PackageGraph::from_packages([
            TestPackage::new("core", &[]),
            TestPackage::new("core", &[]),
        ]);
        assert!(matches!(result, Err(Error::DuplicatePackage { name }) if name == "core"));
    }

    #[test]
    fn test_core_before_util() {
        let graph = PackageGraph::from_packages([
            TestPackage::new("util", &["core"]),
            TestPackage::new("core", &[]),
        ])
        .unwrap();

        assert_eq!(batch_names(&graph), vec![vec!["core"], vec!["util"]]);
    }

    #[test]
    fn test_external_and_self_dependencies_ignored() {
        let graph = PackageGraph::from_packages([
            TestPackage::new("a", &["lodash", "a"]),
            TestPackage::new("b", &["react"]),
        ])
        .unwrap();

        assert!(!graph.has_cycles());
        assert_eq!(batch_names(&graph), vec![vec!["a", "b"]]);
    }

    #[test]
    fn test_levels_use_longest_path() {
        // d depends on a directly and on c (which is two levels deep)
        let graph = PackageGraph::from_packages([
            TestPackage::new("a", &[]),
            TestPackage::new("b", &["a"]),
            TestPackage::new("c", &["b"]),
            TestPackage::new("d", &["a", "c"]),
        ])
        .unwrap();

        assert_eq!(
            batch_names(&graph),
            vec![vec!["a"], vec!["b"], vec!["c"], vec!["d"]]
        );
    }

    #[test]
    fn test_batch_ordering_priority_then_dependents_then_discovery() {
        let graph = PackageGraph::from_packages([
            TestPackage::new("plain", &[]),
            TestPackage::new("popular", &[]),
            TestPackage::new("urgent", &[]).with_priority(10),
            TestPackage::new("x", &["popular"]),
            TestPackage::new("y", &["popular"]),
            TestPackage::new("also-plain", &[]),
        ])
        .unwrap();

        let batches = batch_names(&graph);
        assert_eq!(batches[0], vec!["urgent", "popular", "plain", "also-plain"]);
        assert_eq!(batches[1], vec!["x", "y"]);
    }

    #[test]
    fn test_cycle_members_share_batch() {
        // right has two dependents (left, top), so it sorts ahead of left
        let graph = PackageGraph::from_packages([
            TestPackage::new("base", &[]),
            TestPackage::new("left", &["base", "right"]),
            TestPackage::new("right", &["left"]),
            TestPackage::new("top", &["right"]),
        ])
        .unwrap();

        assert!(graph.has_cycles());
        assert_eq!(graph.cycles(), vec![vec!["left", "right"]]);
        assert_eq!(
            batch_names(&graph),
            vec![vec!["base"], vec!["right", "left"], vec!["top"]]
        );
    }

    #[test]
    fn test_dependents_and_dependencies() {
        let graph = PackageGraph::from_packages([
            TestPackage::new("core", &[]),
            TestPackage::new("util", &["core"]),
            TestPackage::new("app", &["util", "core"]),
        ])
        .unwrap();

        assert_eq!(graph.dependents_count("core"), 2);
        assert_eq!(graph.dependents_count("app"), 0);
        assert_eq!(graph.dependencies_of("app"), vec!["core", "util"]);
        assert!(graph.contains_package("util"));
        assert_eq!(graph.get_node_by_name("util").map(|n| n.order), Some(1));
    }
}
