//! Driver capability interface.
//!
//! A driver describes one wrapped tool: which binary to run, where its config
//! lives, how that config is produced, and how its output is echoed. Drivers
//! are composed into the orchestrator through the [`DriverRegistry`] rather
//! than by inheriting shared behavior; every method except
//! [`Driver::metadata`] has a default that concrete drivers override as needed.

use crate::config::{format, merge};
use crate::console;
use crate::context::ExecutionContext;
use crate::error::ExecError;
use crate::exec::ExecOutput;
use crate::settings::{DriverSettings, EchoStream};
use crate::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, LazyLock};

pub mod configured;
pub mod registry;

pub use configured::{ConfiguredDriver, OverriddenDriver};
pub use registry::DriverRegistry;

/// Shared handle to a registered driver.
pub type SharedDriver = Arc<dyn Driver>;

/// How a driver's config artifact is materialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigStrategy {
    /// Merge every source and write the result.
    #[default]
    Create,
    /// Copy the resolved source file.
    Copy,
    /// Write a stub that re-exports the resolved source file.
    Reference,
    /// Produce nothing.
    None,
}

impl fmt::Display for ConfigStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Copy => write!(f, "copy"),
            Self::Reference => write!(f, "reference"),
            Self::None => write!(f, "none"),
        }
    }
}

/// How workspace packages see a driver's config artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkspaceStrategy {
    /// Copy every artifact into the package before running there.
    Copy,
    /// Point the tool at the root artifact.
    #[default]
    Reference,
}

/// Static description of a wrapped tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverMetadata {
    /// Driver name, also the key for its config sources.
    pub name: String,
    /// Binary to invoke.
    pub bin: String,
    /// Config file name written into the project or package.
    pub config_name: String,
    /// Flag used to point the tool at its config.
    pub config_option: String,
    /// Always pass `<config_option> <path>`.
    pub use_config_option: bool,
    /// Default config strategy.
    pub config_strategy: ConfigStrategy,
    /// How workspace packages see the artifact.
    pub workspace_strategy: WorkspaceStrategy,
    /// Drop options the tool's help output does not list.
    pub filter_options: bool,
    /// Flag printing the tool's help.
    pub help_option: String,
    /// Options or positionals that put the tool in watch mode.
    pub watch_options: Vec<String>,
    /// Drivers whose configs this driver needs.
    pub dependencies: Vec<String>,
    /// Arguments prepended to every invocation.
    pub args: Vec<String>,
    /// Environment variables for the tool.
    pub env: HashMap<String, String>,
    /// What a successful run echoes.
    pub echo: EchoStream,
}

impl DriverMetadata {
    /// Metadata for `name` running the binary of the same name.
    ///
    /// ```
    /// use toolrig_core::driver::DriverMetadata;
    ///
    /// let meta = DriverMetadata::new("jest").with_config_name("jest.config.js");
    /// assert_eq!(meta.bin, "jest");
    /// assert_eq!(meta.config_option, "--config");
    /// ```
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            bin: name.clone(),
            config_name: format!("{name}.config.json"),
            name,
            config_option: "--config".to_string(),
            use_config_option: false,
            config_strategy: ConfigStrategy::Create,
            workspace_strategy: WorkspaceStrategy::Reference,
            filter_options: false,
            help_option: "--help".to_string(),
            watch_options: Vec::new(),
            dependencies: Vec::new(),
            args: Vec::new(),
            env: HashMap::new(),
            echo: EchoStream::Stdout,
        }
    }

    /// Set the config file name.
    #[must_use]
    pub fn with_config_name(mut self, config_name: impl Into<String>) -> Self {
        self.config_name = config_name.into();
        self
    }

    /// Set the default config strategy.
    #[must_use]
    pub fn with_config_strategy(mut self, strategy: ConfigStrategy) -> Self {
        self.config_strategy = strategy;
        self
    }

    /// Set the driver dependencies.
    #[must_use]
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Overlay the fields set in a `[drivers.<name>]` table.
    pub fn apply(&mut self, settings: &DriverSettings) {
        let s = settings.clone();
        if let Some(bin) = s.bin {
            self.bin = bin;
        }
        if let Some(config_name) = s.config_name {
            self.config_name = config_name;
        }
        if let Some(config_option) = s.config_option {
            self.config_option = config_option;
        }
        if let Some(use_config_option) = s.use_config_option {
            self.use_config_option = use_config_option;
        }
        if let Some(strategy) = s.config_strategy {
            self.config_strategy = strategy;
        }
        if let Some(strategy) = s.workspace_strategy {
            self.workspace_strategy = strategy;
        }
        if let Some(filter_options) = s.filter_options {
            self.filter_options = filter_options;
        }
        if let Some(help_option) = s.help_option {
            self.help_option = help_option;
        }
        if let Some(watch_options) = s.watch_options {
            self.watch_options = watch_options;
        }
        if let Some(dependencies) = s.dependencies {
            self.dependencies = dependencies;
        }
        if let Some(args) = s.args {
            self.args = args;
        }
        if let Some(env) = s.env {
            self.env.extend(env);
        }
        if let Some(echo) = s.echo {
            self.echo = echo;
        }
    }
}

/// Lifecycle callbacks a driver may observe.
///
/// Config hooks receive the data about to be written and may alter it.
#[allow(unused_variables)]
pub trait DriverHooks {
    /// A module config source was loaded.
    fn on_load_module_config(&self, ctx: &ExecutionContext, path: &Path, config: &mut Value) {}

    /// Config embedded in the package manifest was loaded.
    fn on_load_package_config(&self, ctx: &ExecutionContext, config: &mut Value) {}

    /// All sources were merged.
    fn on_merge_config(&self, ctx: &ExecutionContext, config: &mut Value) {}

    /// The merged config is about to be written to `path`.
    fn on_create_config_file(&self, ctx: &ExecutionContext, path: &Path, config: &mut Value) {}

    /// `source` is about to be copied to `path`.
    fn on_copy_config_file(&self, ctx: &ExecutionContext, path: &Path, source: &Path) {}

    /// A stub pointing at `source` is about to be written to `path`.
    fn on_reference_config_file(&self, ctx: &ExecutionContext, path: &Path, source: &Path) {}

    /// A generated config file was deleted.
    fn on_delete_config_file(&self, ctx: &ExecutionContext, path: &Path) {}

    /// The binary is about to run with `argv`.
    fn on_before_execute(&self, ctx: &ExecutionContext, argv: &mut Vec<String>) {}

    /// The binary exited successfully.
    fn on_after_execute(&self, ctx: &ExecutionContext, output: &ExecOutput) {}

    /// The binary failed.
    fn on_failed_execute(&self, ctx: &ExecutionContext, error: &ExecError) {}
}

/// A wrapped tool.
#[async_trait]
pub trait Driver: DriverHooks + Send + Sync {
    /// Static description of the tool.
    fn metadata(&self) -> &DriverMetadata;

    /// The driver's name.
    fn name(&self) -> &str {
        &self.metadata().name
    }

    /// Arguments prepended to every invocation.
    fn args(&self) -> Vec<String> {
        self.metadata().args.clone()
    }

    /// Drivers whose configs this driver needs.
    fn dependencies(&self) -> Vec<String> {
        self.metadata().dependencies.clone()
    }

    /// Combine two config objects. Defaults to a deep merge.
    fn merge_config(&self, prev: Value, next: Value) -> Value {
        merge::deep_merge(prev, next)
    }

    /// Serialize a config for `target`, chosen by its extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is unsupported or serialization fails.
    fn format_config(&self, config: &Value, target: &Path) -> Result<String> {
        format::format_config(config, target)
    }

    /// Echo a successful run's captured output.
    fn process_success(&self, output: &ExecOutput) {
        let echo = self.metadata().echo;
        if matches!(echo, EchoStream::Stdout | EchoStream::Both) {
            console::write_stdout(&output.stdout);
        }
        if matches!(echo, EchoStream::Stderr | EchoStream::Both) {
            console::write_stderr(&output.stderr);
        }
    }

    /// Echo a failed run's captured output, preferring stderr.
    fn process_failure(&self, error: &ExecError) {
        if let ExecError::Failed { stdout, stderr, .. } = error {
            if stderr.trim().is_empty() {
                console::write_stderr(stdout);
            } else {
                console::write_stderr(stderr);
            }
        }
    }

    /// Options the tool accepts, extracted from its help output.
    ///
    /// # Errors
    ///
    /// Returns an error if the help command cannot be run.
    async fn supported_options(&self, ctx: &ExecutionContext) -> Result<Vec<String>> {
        let meta = self.metadata();
        let help =
            crate::exec::process::capture_help(&meta.bin, &meta.help_option, ctx, &meta.env)
                .await?;
        Ok(extract_options(&help))
    }
}

static OPTION_TOKEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?:^|[\s,\[|])(--?[A-Za-z0-9][\w-]*)").ok());

/// Extract option names (`-x`, `--long-name`) from help text, in order of
/// first appearance.
///
/// ```
/// use toolrig_core::driver::extract_options;
///
/// let help = "Usage: tool [options]\n  -w, --watch   Watch files\n  --out-dir <dir>";
/// assert_eq!(extract_options(help), ["-w", "--watch", "--out-dir"]);
/// ```
#[must_use]
pub fn extract_options(help: &str) -> Vec<String> {
    let Some(pattern) = OPTION_TOKEN.as_ref() else {
        return Vec::new();
    };

    let mut options: Vec<String> = Vec::new();
    for capture in pattern.captures_iter(help) {
        let option = &capture[1];
        if !options.iter().any(|o| o == option) {
            options.push(option.to_string());
        }
    }
    options
}
