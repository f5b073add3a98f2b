//! Workspace discovery implementations.
//!
//! This module provides implementations of the [`WorkspaceDiscovery`] trait for
//! discovering workspace packages from:
//! - `package.json` `workspaces` (npm, Bun, Yarn)
//! - `pnpm-workspace.yaml` (pnpm)
//!
//! [`discover_workspace`] picks the right implementation for a root.

use crate::error::{Error, Result};
use crate::manifest::PackageManifest;
use crate::types::{Workspace, WorkspacePackage};
use glob::Pattern;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub mod package_json;
pub mod pnpm_workspace;

pub use package_json::PackageJsonDiscovery;
pub use pnpm_workspace::PnpmWorkspaceDiscovery;

/// Discovers workspace packages from a root directory.
///
/// Implementations handle the package-manager-specific declaration file;
/// member manifests are always `package.json`.
pub trait WorkspaceDiscovery {
    /// Discovers the complete workspace from a root directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the declaration file is missing or invalid, or if
    /// member manifests cannot be read.
    fn discover(&self, root: &Path) -> Result<Workspace>;

    /// Member glob patterns declared at `root`, or `None` if this discovery
    /// finds no declaration there.
    ///
    /// # Errors
    ///
    /// Returns an error if the declaration file exists but cannot be parsed.
    fn declared_patterns(&self, root: &Path) -> Result<Option<Vec<String>>>;
}

/// Discovers the workspace at `root`, preferring `pnpm-workspace.yaml` over
/// the `workspaces` field of `package.json`.
///
/// # Errors
///
/// Returns [`Error::NoWorkspaceDeclarations`] if neither declaration exists,
/// or any error raised while loading member manifests.
pub fn discover_workspace(root: &Path) -> Result<Workspace> {
    if PnpmWorkspaceDiscovery.declared_patterns(root)?.is_some() {
        return PnpmWorkspaceDiscovery.discover(root);
    }
    if PackageJsonDiscovery.declared_patterns(root)?.is_some() {
        return PackageJsonDiscovery.discover(root);
    }
    Err(Error::NoWorkspaceDeclarations {
        root: root.to_path_buf(),
    })
}

/// Whether `root` declares any workspaces.
#[must_use]
pub fn has_workspace_declarations(root: &Path) -> bool {
    [
        PnpmWorkspaceDiscovery.declared_patterns(root),
        PackageJsonDiscovery.declared_patterns(root),
    ]
    .into_iter()
    .any(|patterns| matches!(patterns, Ok(Some(p)) if !p.is_empty()))
}

/// Loads every valid member under the given glob patterns.
///
/// # Tolerant Validation Behavior
///
/// Directories without a `package.json`, with invalid JSON, or with no
/// `name` field are silently skipped. Only I/O errors are propagated.
pub(crate) fn load_members(root: &Path, patterns: &[String]) -> Result<Vec<WorkspacePackage>> {
    let mut packages = Vec::new();

    for path in resolve_glob_patterns(root, patterns, &[])? {
        let manifest_path = path.join("package.json");
        if !manifest_path.exists() {
            continue;
        }

        let manifest = match PackageManifest::load(&manifest_path) {
            Ok(manifest) => manifest,
            Err(Error::Json { .. }) => {
                tracing::debug!(path = %manifest_path.display(), "Skipping invalid package.json");
                continue;
            }
            Err(e) => return Err(e),
        };

        let Some(name) = manifest.name else {
            continue;
        };

        packages.push(WorkspacePackage {
            name,
            path,
            manifest_path,
            version: manifest.version,
            dependencies: manifest.dependencies,
            peer_dependencies: manifest.peer_dependencies,
            dev_dependencies: manifest.dev_dependencies,
            priority: manifest.workspace.and_then(|w| w.priority),
        });
    }

    Ok(packages)
}

/// Resolves glob patterns to find directories, handling exclusions.
///
/// # Arguments
///
/// * `root` - The root directory to resolve patterns from.
/// * `patterns` - List of glob patterns to match (e.g., "packages/*").
/// * `exclusions` - List of glob patterns to exclude (e.g., "packages/excluded").
///   Note: Patterns starting with "!" in the `patterns` list are also treated as exclusions.
///
/// # Returns
///
/// A sorted list of unique, absolute paths (rooted under `root`) that match the
/// patterns and are not excluded.
///
/// # Errors
///
/// Returns an error if a pattern is malformed.
pub fn resolve_glob_patterns(
    root: &Path,
    patterns: &[String],
    exclusions: &[String],
) -> Result<Vec<PathBuf>> {
    let mut matched_paths = HashSet::new();
    let mut inclusion_patterns = Vec::new();
    let mut exclusion_patterns = Vec::new();

    let compile = |p: &str| {
        Pattern::new(p).map_err(|e| Error::InvalidWorkspaceConfig {
            path: root.to_path_buf(),
            message: format!("invalid workspace pattern '{p}': {e}"),
        })
    };

    for p in exclusions {
        exclusion_patterns.push(compile(p)?);
    }

    for p in patterns {
        if let Some(stripped) = p.strip_prefix('!') {
            exclusion_patterns.push(compile(stripped)?);
        } else {
            inclusion_patterns.push(compile(p.trim_end_matches('/'))?);
        }
    }

    let walker = WalkDir::new(root).follow_links(false);

    for entry in walker
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_str().unwrap_or("");
            // Prune heavy directories
            !matches!(name, "node_modules" | ".git" | "target" | "dist")
        })
        .filter_map(std::result::Result::ok)
    {
        if !entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        if path == root {
            continue;
        }

        let Ok(rel_path) = path.strip_prefix(root) else {
            continue;
        };

        if exclusion_patterns.iter().any(|p| p.matches_path(rel_path)) {
            continue;
        }

        if inclusion_patterns.iter().any(|p| p.matches_path(rel_path)) {
            matched_paths.insert(path.to_path_buf());
        }
    }

    let mut result: Vec<PathBuf> = matched_paths.into_iter().collect();
    result.sort();
    Ok(result)
}

/// Reads and parses a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed as valid JSON.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| Error::Io {
        source: e,
        path: Some(path.to_path_buf()),
        operation: "reading json file".to_string(),
    })?;

    serde_json::from_str(&content).map_err(|e| Error::Json {
        source: e,
        path: Some(path.to_path_buf()),
    })
}

/// Reads and parses a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed as valid YAML.
pub fn read_yaml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| Error::Io {
        source: e,
        path: Some(path.to_path_buf()),
        operation: "reading yaml file".to_string(),
    })?;

    serde_yaml::from_str(&content).map_err(|e| Error::Yaml {
        source: e,
        path: Some(path.to_path_buf()),
    })
}
