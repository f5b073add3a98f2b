//! `package.json` manifest model shared by discovery and config resolution.

use crate::discovery::read_json_file;
use crate::error::Result;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// The subset of `package.json` that toolrig reads.
///
/// Unknown top-level keys are kept in [`PackageManifest::extra`] so that
/// tool-namespaced configuration (`"eslint": {...}`) can be looked up.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    /// Package name.
    pub name: Option<String>,
    /// Package version.
    pub version: Option<String>,
    /// Workspace glob declarations.
    pub workspaces: Option<WorkspacesField>,
    /// Runtime dependencies.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    /// Peer dependencies.
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,
    /// Development dependencies.
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
    /// Per-package workspace metadata.
    pub workspace: Option<WorkspaceMetadata>,
    /// All remaining keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `workspaces` field, in either array or object form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WorkspacesField {
    /// `"workspaces": ["packages/*"]`
    Array(Vec<String>),
    /// `"workspaces": { "packages": ["packages/*"] }`
    Object {
        /// Member globs.
        packages: Vec<String>,
    },
}

impl WorkspacesField {
    /// The member glob patterns.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        match self {
            Self::Array(patterns) | Self::Object { packages: patterns } => patterns,
        }
    }
}

/// `"workspace": { "priority": 10 }`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkspaceMetadata {
    /// Ordering weight within a dependency batch.
    pub priority: Option<i64>,
}

impl PackageManifest {
    /// Reads and parses `package.json` at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        read_json_file(path)
    }

    /// Configuration embedded under a tool's namespace key.
    #[must_use]
    pub fn namespaced_config(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest_with_namespaced_config() {
        let manifest: PackageManifest = serde_json::from_str(
            r#"{
                "name": "@scope/app",
                "workspaces": { "packages": ["packages/*"] },
                "devDependencies": { "eslint": "^9.0.0" },
                "workspace": { "priority": 3 },
                "eslint": { "rules": { "semi": "error" } }
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.name.as_deref(), Some("@scope/app"));
        assert_eq!(
            manifest.workspaces.as_ref().map(WorkspacesField::patterns),
            Some(&["packages/*".to_string()][..])
        );
        assert_eq!(manifest.workspace.and_then(|w| w.priority), Some(3));
        assert_eq!(
            manifest.extra.get("eslint").and_then(|v| v.pointer("/rules/semi")),
            Some(&Value::String("error".into()))
        );
        assert!(manifest.extra.get("devDependencies").is_none());
    }
}
