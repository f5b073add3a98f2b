//! Validation utilities for package graphs.

use crate::{PackageGraph, PackageNodeData};

/// Result of graph validation.
///
/// Cycles are not fatal for batching, but callers that want a strict
/// workspace can reject them.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Package names for each dependency cycle found.
    pub cycles: Vec<Vec<String>>,
}

impl ValidationResult {
    /// Whether the graph is acyclic.
    #[must_use]
    pub fn is_acyclic(&self) -> bool {
        self.cycles.is_empty()
    }
}

impl<T: PackageNodeData> PackageGraph<T> {
    /// Validate the graph structure.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        ValidationResult {
            cycles: self.cycles(),
        }
    }
}
