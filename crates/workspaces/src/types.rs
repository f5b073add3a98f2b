//! Core types for representing workspaces, packages, and package managers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use toolrig_graph::PackageNodeData;

/// Represents a discovered monorepo with all of its packages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    /// The root directory of the workspace.
    pub root: PathBuf,

    /// The detected package manager.
    pub manager: PackageManager,

    /// All workspace packages, in discovery order.
    pub packages: Vec<WorkspacePackage>,
}

impl Workspace {
    /// Creates a new empty workspace.
    ///
    /// # Example
    ///
    /// ```
    /// use toolrig_workspaces::{Workspace, PackageManager};
    /// use std::path::PathBuf;
    ///
    /// let workspace = Workspace::new(PathBuf::from("/repo"), PackageManager::Npm);
    /// assert_eq!(workspace.package_count(), 0);
    /// ```
    #[must_use]
    pub fn new(root: PathBuf, manager: PackageManager) -> Self {
        Self {
            root,
            manager,
            packages: Vec::new(),
        }
    }

    /// Finds a package by its full name.
    #[must_use]
    pub fn find_package(&self, name: &str) -> Option<&WorkspacePackage> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Returns the number of workspace packages.
    #[must_use]
    pub fn package_count(&self) -> usize {
        self.packages.len()
    }
}

/// One package of a monorepo.
///
/// Names are unique across a workspace; the package set is discovered once
/// per run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspacePackage {
    /// Package name, possibly scoped (`@scope/name`).
    pub name: String,

    /// Absolute path of the package directory.
    pub path: PathBuf,

    /// Path to the package's `package.json`.
    pub manifest_path: PathBuf,

    /// Declared version, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Runtime dependencies (name -> version range).
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,

    /// Peer dependencies (name -> version range).
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,

    /// Development dependencies (name -> version range).
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,

    /// Explicit ordering weight from `workspace.priority` in the manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
}

impl WorkspacePackage {
    /// Creates a package with no dependencies rooted at `path`.
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: name.into(),
            manifest_path: path.join("package.json"),
            path,
            ..Self::default()
        }
    }

    /// Adds a runtime dependency.
    #[must_use]
    pub fn with_dependency(mut self, name: impl Into<String>, range: impl Into<String>) -> Self {
        self.dependencies.insert(name.into(), range.into());
        self
    }

    /// Sets the ordering priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    /// The local form of the package name, without its scope.
    ///
    /// ```
    /// use toolrig_workspaces::WorkspacePackage;
    ///
    /// assert_eq!(WorkspacePackage::new("@scope/core", "/r").short_name(), "core");
    /// assert_eq!(WorkspacePackage::new("util", "/r").short_name(), "util");
    /// ```
    #[must_use]
    pub fn short_name(&self) -> &str {
        short_name(&self.name)
    }

    /// Every declared dependency name across all dependency kinds.
    pub fn all_dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .keys()
            .chain(self.peer_dependencies.keys())
            .chain(self.dev_dependencies.keys())
            .map(String::as_str)
    }
}

impl PackageNodeData for WorkspacePackage {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.all_dependency_names()
    }

    fn priority(&self) -> i64 {
        self.priority.unwrap_or(0)
    }
}

/// Strips an npm scope from a package name.
#[must_use]
pub fn short_name(name: &str) -> &str {
    match name.strip_prefix('@') {
        Some(scoped) => scoped.split_once('/').map_or(name, |(_, local)| local),
        None => name,
    }
}

/// Identifies the package manager in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageManager {
    /// npm package manager
    Npm,
    /// Bun package manager
    Bun,
    /// pnpm package manager
    Pnpm,
    /// Yarn Classic (v1.x)
    YarnClassic,
    /// Yarn Modern (v2+, Berry)
    YarnModern,
}

impl PackageManager {
    /// Detects the package manager from lockfiles at `root`, defaulting to npm.
    #[must_use]
    pub fn detect(root: &Path) -> Self {
        if root.join("pnpm-lock.yaml").exists() || root.join("pnpm-workspace.yaml").exists() {
            Self::Pnpm
        } else if root.join("bun.lockb").exists() || root.join("bun.lock").exists() {
            Self::Bun
        } else if root.join("yarn.lock").exists() {
            if root.join(".yarnrc.yml").exists() {
                Self::YarnModern
            } else {
                Self::YarnClassic
            }
        } else {
            Self::Npm
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Npm => write!(f, "npm"),
            Self::Bun => write!(f, "bun"),
            Self::Pnpm => write!(f, "pnpm"),
            Self::YarnClassic => write!(f, "yarn-classic"),
            Self::YarnModern => write!(f, "yarn-modern"),
        }
    }
}
