//! Error types for package graph operations.

use thiserror::Error;

/// Result type for package graph operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building a package graph.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Two packages in the same set share a name.
    #[error("Package '{name}' is declared more than once in the workspace")]
    DuplicatePackage {
        /// The duplicated package name.
        name: String,
    },
}
