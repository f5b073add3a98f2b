//! Tool settings loaded from `.config/toolrig.toml`.
//!
//! Every field is optional in the file; a missing file yields the defaults.
//! `TOOLRIG_CONCURRENCY` and `TOOLRIG_GRAPH` override the `[execute]` table.

use crate::driver::{ConfigStrategy, WorkspaceStrategy};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Settings file location relative to the project root.
pub const SETTINGS_FILE: &str = ".config/toolrig.toml";

/// Directory holding local config overrides, relative to the project root.
pub const LOCAL_CONFIG_DIR: &str = ".config/toolrig";

/// Module name that points at the project's own config directory.
pub const LOCAL_MODULE: &str = "@local";

/// Top-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolSettings {
    /// Config module: `@local`, a relative path, or a package in `node_modules`.
    pub module: String,

    /// Execute-phase settings.
    pub execute: ExecuteSettings,

    /// Configure-phase settings.
    pub configure: ConfigureSettings,

    /// Driver definitions and overrides, by driver name.
    pub drivers: BTreeMap<String, DriverSettings>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            module: LOCAL_MODULE.to_string(),
            execute: ExecuteSettings::default(),
            configure: ConfigureSettings::default(),
            drivers: BTreeMap::new(),
        }
    }
}

impl ToolSettings {
    /// Load settings for the project at `root`, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if
    /// an override or the resulting settings are invalid.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(SETTINGS_FILE);
        let mut settings = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| Error::io(e, path.clone(), "reading settings"))?;
            Self::from_toml(&content, &path)?
        } else {
            tracing::debug!(path = %path.display(), "No settings file, using defaults");
            Self::default()
        };

        settings.apply_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Toml`] if the document is invalid.
    pub fn from_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|source| Error::Toml {
            source,
            path: path.to_path_buf(),
        })
    }

    /// Apply `TOOLRIG_CONCURRENCY` and `TOOLRIG_GRAPH`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a variable holds an unparsable value.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("TOOLRIG_CONCURRENCY") {
            self.execute.concurrency = value.trim().parse().map_err(|_| {
                Error::configuration(format!(
                    "TOOLRIG_CONCURRENCY must be a positive integer, got `{value}`"
                ))
            })?;
        }

        if let Ok(value) = std::env::var("TOOLRIG_GRAPH") {
            self.execute.graph = parse_bool(&value).ok_or_else(|| {
                Error::configuration(format!("TOOLRIG_GRAPH must be a boolean, got `{value}`"))
            })?;
        }

        Ok(())
    }

    /// Check cross-field invariants.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `execute.concurrency` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.execute.concurrency == 0 {
            return Err(Error::configuration("execute.concurrency must be at least 1"));
        }
        Ok(())
    }

    /// Directory searched for module configs (`<driver>.{json,toml,yaml,yml}`).
    #[must_use]
    pub fn module_config_dir(&self, root: &Path) -> PathBuf {
        let module = self.module.trim();
        if module.is_empty() || module == LOCAL_MODULE {
            Self::local_config_dir(root)
        } else if module.starts_with('.') || Path::new(module).is_absolute() {
            root.join(module).join("configs")
        } else {
            root.join("node_modules").join(module).join("configs")
        }
    }

    /// Directory searched for local overrides.
    #[must_use]
    pub fn local_config_dir(root: &Path) -> PathBuf {
        root.join(LOCAL_CONFIG_DIR)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `[execute]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecuteSettings {
    /// Default bound on concurrently running units.
    pub concurrency: usize,
    /// Order workspace packages by their dependency graph.
    pub graph: bool,
    /// How subprocess output reaches the console.
    pub output: OutputStrategy,
    /// Bytes captured per stream before the run fails.
    pub max_buffer: usize,
}

impl Default for ExecuteSettings {
    fn default() -> Self {
        Self {
            concurrency: 3,
            graph: true,
            output: OutputStrategy::Buffer,
            max_buffer: 10 * 1024 * 1024,
        }
    }
}

/// `[configure]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConfigureSettings {
    /// When generated config files are removed.
    pub cleanup: CleanupPolicy,
}

/// Output capture mode for wrapped tools.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OutputStrategy {
    /// Collect everything, echo through the driver's handlers when done.
    #[default]
    Buffer,
    /// Write lines through as they arrive, prefixed with the unit in workspaces.
    Stream,
    /// Hand the terminal to the subprocess.
    Inherit,
}

impl std::str::FromStr for OutputStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buffer" => Ok(Self::Buffer),
            "stream" => Ok(Self::Stream),
            "inherit" => Ok(Self::Inherit),
            _ => Err(format!("Unknown output strategy: {s}")),
        }
    }
}

/// When config artifacts are deleted after a run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupPolicy {
    /// Leave generated files in place.
    #[default]
    Never,
    /// Delete only when the run failed.
    OnFailure,
    /// Delete after every run.
    Always,
}

impl CleanupPolicy {
    /// Whether cleanup runs for a run that did (or did not) fail.
    #[must_use]
    pub fn should_run(self, failed: bool) -> bool {
        match self {
            Self::Never => false,
            Self::OnFailure => failed,
            Self::Always => true,
        }
    }
}

/// Which captured stream a successful run echoes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EchoStream {
    /// Echo stdout only.
    #[default]
    Stdout,
    /// Echo stderr only.
    Stderr,
    /// Echo both streams.
    Both,
}

/// `[drivers.<name>]` table. Unset fields fall back to the driver's own
/// metadata, or to defaults for drivers defined only in settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DriverSettings {
    /// Binary to invoke.
    pub bin: Option<String>,
    /// Config file name written into the project or package.
    pub config_name: Option<String>,
    /// Flag used to point the tool at its config.
    pub config_option: Option<String>,
    /// Always pass `<config_option> <path>`.
    pub use_config_option: Option<bool>,
    /// How the config artifact is produced.
    pub config_strategy: Option<ConfigStrategy>,
    /// How workspace packages see the artifact.
    pub workspace_strategy: Option<WorkspaceStrategy>,
    /// Drop options the tool's help output does not list.
    pub filter_options: Option<bool>,
    /// Flag printing the tool's help.
    pub help_option: Option<String>,
    /// Options or positionals that put the tool in watch mode.
    pub watch_options: Option<Vec<String>>,
    /// Drivers whose configs this driver needs.
    pub dependencies: Option<Vec<String>>,
    /// Arguments prepended to every invocation.
    pub args: Option<Vec<String>>,
    /// Environment variables for the tool.
    pub env: Option<HashMap<String, String>>,
    /// What a successful run echoes.
    pub echo: Option<EchoStream>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = ToolSettings::default();
        assert_eq!(settings.module, "@local");
        assert_eq!(settings.execute.concurrency, 3);
        assert!(settings.execute.graph);
        assert_eq!(settings.execute.output, OutputStrategy::Buffer);
        assert_eq!(settings.configure.cleanup, CleanupPolicy::Never);
    }

    #[test]
    fn test_parse_full_document() {
        let doc = r#"
module = "./tooling"

[execute]
concurrency = 8
graph = false
output = "stream"

[configure]
cleanup = "on-failure"

[drivers.eslint]
bin = "eslint"
config_name = ".eslintrc.js"
config_strategy = "reference"
watch_options = ["--watch"]
env = { ESLINT_USE_FLAT_CONFIG = "false" }
echo = "both"
"#;
        let settings = ToolSettings::from_toml(doc, Path::new("toolrig.toml")).unwrap();

        assert_eq!(settings.execute.concurrency, 8);
        assert!(!settings.execute.graph);
        assert_eq!(settings.execute.output, OutputStrategy::Stream);
        assert_eq!(settings.execute.max_buffer, 10 * 1024 * 1024);
        assert_eq!(settings.configure.cleanup, CleanupPolicy::OnFailure);

        let eslint = &settings.drivers["eslint"];
        assert_eq!(eslint.config_strategy, Some(ConfigStrategy::Reference));
        assert_eq!(eslint.echo, Some(EchoStream::Both));
        assert_eq!(
            eslint.env.as_ref().and_then(|e| e.get("ESLINT_USE_FLAT_CONFIG")),
            Some(&"false".to_string())
        );
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        temp_env::with_vars_unset(["TOOLRIG_CONCURRENCY", "TOOLRIG_GRAPH"], || {
            let settings = ToolSettings::load(dir.path()).unwrap();
            assert_eq!(settings, ToolSettings::default());
        });
    }

    #[test]
    fn test_env_overrides() {
        let dir = TempDir::new().unwrap();
        temp_env::with_vars(
            [
                ("TOOLRIG_CONCURRENCY", Some("6")),
                ("TOOLRIG_GRAPH", Some("false")),
            ],
            || {
                let settings = ToolSettings::load(dir.path()).unwrap();
                assert_eq!(settings.execute.concurrency, 6);
                assert!(!settings.execute.graph);
            },
        );
    }

    #[test]
    fn test_invalid_env_override() {
        let dir = TempDir::new().unwrap();
        temp_env::with_var("TOOLRIG_CONCURRENCY", Some("many"), || {
            assert!(ToolSettings::load(dir.path()).is_err());
        });
        temp_env::with_var("TOOLRIG_CONCURRENCY", Some("0"), || {
            assert!(ToolSettings::load(dir.path()).is_err());
        });
    }

    #[test]
    fn test_module_config_dir() {
        let root = Path::new("/repo");
        let mut settings = ToolSettings::default();
        assert_eq!(
            settings.module_config_dir(root),
            PathBuf::from("/repo/.config/toolrig")
        );

        settings.module = "./tooling".into();
        assert_eq!(
            settings.module_config_dir(root),
            PathBuf::from("/repo/./tooling/configs")
        );

        settings.module = "@acme/config".into();
        assert_eq!(
            settings.module_config_dir(root),
            PathBuf::from("/repo/node_modules/@acme/config/configs")
        );
    }

    #[test]
    fn test_cleanup_policy() {
        assert!(!CleanupPolicy::Never.should_run(true));
        assert!(CleanupPolicy::OnFailure.should_run(true));
        assert!(!CleanupPolicy::OnFailure.should_run(false));
        assert!(CleanupPolicy::Always.should_run(false));
    }
}
