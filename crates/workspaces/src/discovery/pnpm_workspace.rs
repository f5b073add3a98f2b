//! Discovery implementation for pnpm workspaces via pnpm-workspace.yaml.

use crate::discovery::{WorkspaceDiscovery, load_members, read_yaml_file};
use crate::error::{Error, Result};
use crate::types::{PackageManager, Workspace};
use serde::Deserialize;
use std::path::Path;

/// Discovers workspaces configured in `pnpm-workspace.yaml`.
pub struct PnpmWorkspaceDiscovery;

impl WorkspaceDiscovery for PnpmWorkspaceDiscovery {
    fn discover(&self, root: &Path) -> Result<Workspace> {
        let Some(patterns) = self.declared_patterns(root)? else {
            return Err(Error::WorkspaceNotFound {
                path: root.to_path_buf(),
            });
        };

        let mut workspace = Workspace::new(root.to_path_buf(), PackageManager::Pnpm);
        workspace.packages = load_members(root, &patterns)?;

        Ok(workspace)
    }

    fn declared_patterns(&self, root: &Path) -> Result<Option<Vec<String>>> {
        let workspace_yaml_path = root.join("pnpm-workspace.yaml");
        if !workspace_yaml_path.exists() {
            return Ok(None);
        }

        let config: PnpmWorkspace = read_yaml_file(&workspace_yaml_path)?;
        Ok(Some(config.packages))
    }
}

#[derive(Deserialize)]
struct PnpmWorkspace {
    #[serde(default)]
    packages: Vec<String>,
}
