//! Package graph algorithms and dependency batching for toolrig.
//!
//! This crate orders the packages of a monorepo into *batches*: groups of
//! packages that can be processed concurrently, where every package's
//! same-workspace dependencies live in an earlier batch.
//!
//! # Key Types
//!
//! - [`PackageGraph`]: The graph structure built from a package set
//! - [`PackageNodeData`]: Trait that package types implement to be stored in the graph
//! - [`GraphNode`]: A node in the graph containing the package name and data
//!
//! # Example
//!
//! ```ignore
//! use toolrig_graph::{PackageGraph, PackageNodeData};
//!
//! #[derive(Clone)]
//! struct Pkg {
//!     name: String,
//!     deps: Vec<String>,
//! }
//!
//! impl PackageNodeData for Pkg {
//!     fn name(&self) -> &str {
//!         &self.name
//!     }
//!
//!     fn dependency_names(&self) -> impl Iterator<Item = &str> {
//!         self.deps.iter().map(String::as_str)
//!     }
//! }
//!
//! let graph = PackageGraph::from_packages(packages)?;
//! for batch in graph.batches() {
//!     // every package in `batch` can run concurrently
//! }
//! ```

mod error;
mod graph;
mod traversal;
mod validation;

pub use error::{Error, Result};
pub use graph::{GraphNode, PackageGraph};
pub use traversal::Batches;
pub use validation::ValidationResult;

/// Trait for package data that can be stored in the package graph.
///
/// Dependency names that don't match another package in the same graph are
/// external dependencies and are ignored when edges are wired.
pub trait PackageNodeData: Clone {
    /// Unique name of the package.
    fn name(&self) -> &str;

    /// Returns the names of everything this package depends on.
    fn dependency_names(&self) -> impl Iterator<Item = &str>;

    /// Explicit ordering weight; higher runs first within a batch.
    fn priority(&self) -> i64 {
        0
    }
}
