//! Discovery implementation for npm/Bun/Yarn workspaces via package.json.

use crate::discovery::{WorkspaceDiscovery, load_members};
use crate::error::{Error, Result};
use crate::manifest::PackageManifest;
use crate::types::{PackageManager, Workspace};
use std::path::Path;

/// Discovers workspaces configured in `package.json`.
///
/// Handles both the array form and the object form (with a `packages` key)
/// of the `workspaces` field.
pub struct PackageJsonDiscovery;

impl WorkspaceDiscovery for PackageJsonDiscovery {
    fn discover(&self, root: &Path) -> Result<Workspace> {
        let Some(patterns) = self.declared_patterns(root)? else {
            return Err(Error::WorkspaceNotFound {
                path: root.to_path_buf(),
            });
        };

        let mut workspace = Workspace::new(root.to_path_buf(), PackageManager::detect(root));
        workspace.packages = load_members(root, &patterns)?;
        tracing::debug!(
            root = %root.display(),
            packages = workspace.package_count(),
            "Discovered package.json workspace"
        );

        Ok(workspace)
    }

    fn declared_patterns(&self, root: &Path) -> Result<Option<Vec<String>>> {
        let manifest_path = root.join("package.json");
        if !manifest_path.exists() {
            return Ok(None);
        }

        let manifest = PackageManifest::load(&manifest_path)?;
        Ok(manifest.workspaces.map(|w| w.patterns().to_vec()))
    }
}
