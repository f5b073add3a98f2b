//! Dependency batching for workspace packages.

use crate::error::Result;
use crate::types::WorkspacePackage;
use toolrig_graph::PackageGraph;

/// Orders packages into dependency batches.
///
/// With `graph` disabled, a single batch holds every package in its original
/// order. Otherwise batch N only contains packages whose same-workspace
/// dependencies live in batches `< N`; cycles degrade to a shared batch.
///
/// # Errors
///
/// Returns an error if two packages share a name.
pub fn resolve_batches(
    packages: &[WorkspacePackage],
    graph: bool,
) -> Result<Vec<Vec<WorkspacePackage>>> {
    if packages.is_empty() {
        return Ok(vec![]);
    }

    if !graph {
        return Ok(vec![packages.to_vec()]);
    }

    let graph = PackageGraph::from_packages(packages.iter().cloned())?;
    Ok(graph
        .batches()
        .into_iter()
        .map(|batch| batch.into_iter().map(|node| node.package).collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(batches: &[Vec<WorkspacePackage>]) -> Vec<Vec<&str>> {
        batches
            .iter()
            .map(|b| b.iter().map(|p| p.name.as_str()).collect())
            .collect()
    }

    #[test]
    fn test_core_then_util() {
        let packages = vec![
            WorkspacePackage::new("core", "/repo/packages/core"),
            WorkspacePackage::new("util", "/repo/packages/util").with_dependency("core", "^1.0.0"),
        ];

        let batches = resolve_batches(&packages, true).unwrap();
        assert_eq!(names(&batches), vec![vec!["core"], vec!["util"]]);
    }

    #[test]
    fn test_graph_disabled_keeps_original_order() {
        let packages = vec![
            WorkspacePackage::new("util", "/repo/util").with_dependency("core", "*"),
            WorkspacePackage::new("core", "/repo/core"),
        ];

        let batches = resolve_batches(&packages, false).unwrap();
        assert_eq!(names(&batches), vec![vec!["util", "core"]]);
    }

    #[test]
    fn test_peer_and_dev_dependencies_count() {
        let mut app = WorkspacePackage::new("app", "/repo/app");
        app.peer_dependencies.insert("ui".into(), "*".into());
        let mut ui = WorkspacePackage::new("ui", "/repo/ui");
        ui.dev_dependencies.insert("tokens".into(), "*".into());
        let tokens = WorkspacePackage::new("tokens", "/repo/tokens");

        let batches = resolve_batches(&[app, ui, tokens], true).unwrap();
        assert_eq!(names(&batches), vec![vec!["tokens"], vec!["ui"], vec!["app"]]);
    }

    #[test]
    fn test_duplicate_names_fail() {
        let packages = vec![
            WorkspacePackage::new("dup", "/a"),
            WorkspacePackage::new("dup", "/b"),
        ];
        assert!(resolve_batches(&packages, true).is_err());
    }
}
