//! Removal of generated config files.

use crate::context::ExecutionContext;
use crate::{Error, Result};
use std::io::ErrorKind;

/// Delete every config file recorded on `ctx`, emptying the list.
///
/// Files that are already gone count as deleted. The owning driver's
/// `on_delete_config_file` hook runs for each file. Returns how many entries
/// were processed.
///
/// # Errors
///
/// Attempts every file, then returns the first deletion error.
pub async fn cleanup(ctx: &mut ExecutionContext) -> Result<usize> {
    let paths = std::mem::take(&mut ctx.config_paths);
    let mut first_error = None;
    let mut removed = 0;

    for entry in &paths {
        match tokio::fs::remove_file(&entry.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %entry.path.display(), "Config file already removed");
            }
            Err(e) => {
                tracing::warn!(path = %entry.path.display(), error = %e, "Failed to remove config file");
                first_error.get_or_insert_with(|| {
                    Error::io(e, entry.path.clone(), "remove config")
                });
                continue;
            }
        }

        removed += 1;
        if let Some(driver) = ctx.drivers.get(&entry.driver) {
            driver.on_delete_config_file(ctx, &entry.path);
        }
        crate::emit_config_deleted!(entry.driver, entry.path.display());
    }

    match first_error {
        Some(error) => Err(error),
        None => Ok(removed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionArgs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join(".eslintrc.json");
        std::fs::write(&present, "{}").unwrap();

        let mut ctx = ExecutionContext::new(dir.path(), ExecutionArgs::default());
        ctx.add_config_path("eslint", &present);
        ctx.add_config_path("jest", dir.path().join("jest.config.js"));

        assert_eq!(cleanup(&mut ctx).await.unwrap(), 2);
        assert!(!present.exists());
        assert!(ctx.config_paths.is_empty());

        assert_eq!(cleanup(&mut ctx).await.unwrap(), 0);
    }
}
