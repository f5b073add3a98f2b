//! Drivers built from `[drivers.<name>]` settings tables.

use super::{Driver, DriverHooks, DriverMetadata, SharedDriver};
use crate::context::ExecutionContext;
use crate::error::ExecError;
use crate::exec::ExecOutput;
use crate::settings::DriverSettings;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

/// A driver defined entirely by settings, with default behavior throughout.
#[derive(Debug, Clone)]
pub struct ConfiguredDriver {
    metadata: DriverMetadata,
}

impl ConfiguredDriver {
    /// Wrap existing metadata.
    #[must_use]
    pub fn new(metadata: DriverMetadata) -> Self {
        Self { metadata }
    }

    /// Build the driver `name` from its settings table.
    #[must_use]
    pub fn from_settings(name: &str, settings: &DriverSettings) -> Self {
        let mut metadata = DriverMetadata::new(name);
        metadata.apply(settings);
        Self { metadata }
    }
}

impl DriverHooks for ConfiguredDriver {}

impl Driver for ConfiguredDriver {
    fn metadata(&self) -> &DriverMetadata {
        &self.metadata
    }
}

/// A registered driver whose metadata was adjusted by settings.
///
/// Behavior and hooks stay with the inner driver.
pub struct OverriddenDriver {
    inner: SharedDriver,
    metadata: DriverMetadata,
}

impl OverriddenDriver {
    /// Overlay `settings` on `inner`'s metadata.
    #[must_use]
    pub fn new(inner: SharedDriver, settings: &DriverSettings) -> Self {
        let mut metadata = inner.metadata().clone();
        metadata.apply(settings);
        Self { inner, metadata }
    }
}

impl DriverHooks for OverriddenDriver {
    fn on_load_module_config(&self, ctx: &ExecutionContext, path: &Path, config: &mut Value) {
        self.inner.on_load_module_config(ctx, path, config);
    }

    fn on_load_package_config(&self, ctx: &ExecutionContext, config: &mut Value) {
        self.inner.on_load_package_config(ctx, config);
    }

    fn on_merge_config(&self, ctx: &ExecutionContext, config: &mut Value) {
        self.inner.on_merge_config(ctx, config);
    }

    fn on_create_config_file(&self, ctx: &ExecutionContext, path: &Path, config: &mut Value) {
        self.inner.on_create_config_file(ctx, path, config);
    }

    fn on_copy_config_file(&self, ctx: &ExecutionContext, path: &Path, source: &Path) {
        self.inner.on_copy_config_file(ctx, path, source);
    }

    fn on_reference_config_file(&self, ctx: &ExecutionContext, path: &Path, source: &Path) {
        self.inner.on_reference_config_file(ctx, path, source);
    }

    fn on_delete_config_file(&self, ctx: &ExecutionContext, path: &Path) {
        self.inner.on_delete_config_file(ctx, path);
    }

    fn on_before_execute(&self, ctx: &ExecutionContext, argv: &mut Vec<String>) {
        self.inner.on_before_execute(ctx, argv);
    }

    fn on_after_execute(&self, ctx: &ExecutionContext, output: &ExecOutput) {
        self.inner.on_after_execute(ctx, output);
    }

    fn on_failed_execute(&self, ctx: &ExecutionContext, error: &ExecError) {
        self.inner.on_failed_execute(ctx, error);
    }
}

#[async_trait]
impl Driver for OverriddenDriver {
    fn metadata(&self) -> &DriverMetadata {
        &self.metadata
    }

    fn merge_config(&self, prev: Value, next: Value) -> Value {
        self.inner.merge_config(prev, next)
    }

    fn format_config(&self, config: &Value, target: &Path) -> Result<String> {
        self.inner.format_config(config, target)
    }

    fn process_success(&self, output: &ExecOutput) {
        self.inner.process_success(output);
    }

    fn process_failure(&self, error: &ExecError) {
        self.inner.process_failure(error);
    }

    async fn supported_options(&self, ctx: &ExecutionContext) -> Result<Vec<String>> {
        self.inner.supported_options(ctx).await
    }
}
