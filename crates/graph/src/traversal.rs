//! Traversal types for package graphs.

use crate::GraphNode;

/// Groups of packages that can be processed in parallel.
///
/// Each inner vector contains packages that have no ordering constraint
/// between them. The outer vector is ordered by dependency level - every
/// package in batch N must settle before batch N+1 starts.
pub type Batches<T> = Vec<Vec<GraphNode<T>>>;
