//! Workspace discovery and dependency batching for toolrig.
//!
//! This crate discovers the packages of a JavaScript-style monorepo and
//! orders them for execution.
//!
//! # Workspace Discovery
//!
//! - [`PackageJsonDiscovery`] - `workspaces` field of `package.json` (npm, Bun, Yarn)
//! - [`PnpmWorkspaceDiscovery`] - `pnpm-workspace.yaml`
//! - [`discover_workspace`] - picks whichever declaration exists
//!
//! Member directories with a missing or malformed `package.json`, or without
//! a `name`, are silently skipped so that one broken member does not block
//! the rest of the workspace.
//!
//! # Batching
//!
//! [`resolve_batches`] turns a package set into dependency batches using
//! [`toolrig_graph::PackageGraph`].
//!
//! ```rust,ignore
//! use toolrig_workspaces::{discover_workspace, resolve_batches};
//!
//! let workspace = discover_workspace(root)?;
//! for batch in resolve_batches(&workspace.packages, true)? {
//!     // packages in `batch` may run concurrently
//! }
//! ```

pub mod batches;
pub mod discovery;
pub mod error;
pub mod manifest;
pub mod types;

pub use batches::resolve_batches;
pub use discovery::{
    PackageJsonDiscovery, PnpmWorkspaceDiscovery, WorkspaceDiscovery, discover_workspace,
    has_workspace_declarations, resolve_glob_patterns,
};
pub use error::{Error, Result};
pub use manifest::{PackageManifest, WorkspacesField};
pub use types::{PackageManager, Workspace, WorkspacePackage, short_name};
