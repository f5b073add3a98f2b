//! Per-run execution state.

use crate::args::{ORCHESTRATOR_SWITCHES, ParsedArgs, split_parallel, strip_orchestrator_options};
use crate::driver::SharedDriver;
use crate::environment::Environment;
use crate::settings::OutputStrategy;
use crate::{Error, Result};
use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};
use toolrig_workspaces::WorkspacePackage;

/// A config file produced during the configure phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPath {
    /// Driver that owns the file.
    pub driver: String,
    /// Absolute path of the file.
    pub path: PathBuf,
}

/// Arguments for one invocation, split into orchestrator options and the
/// argv forwarded to the wrapped tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionArgs {
    /// Argv forwarded to the tool, orchestrator options removed.
    pub argv: Vec<String>,
    /// Parsed view of `argv`.
    pub parsed: ParsedArgs,
    /// `--workspaces` filter pattern.
    pub workspaces: Option<String>,
    /// `--concurrency` override.
    pub concurrency: Option<usize>,
    /// `--graph` / `--no-graph` override.
    pub graph: Option<bool>,
    /// One extra argv per `--parallel` value.
    pub parallel: Vec<Vec<String>>,
    /// Output strategy override.
    pub output: Option<OutputStrategy>,
}

impl ExecutionArgs {
    /// Args forwarding `argv` unchanged.
    #[must_use]
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            parsed: ParsedArgs::parse(&argv),
            argv,
            ..Self::default()
        }
    }

    /// Extract orchestrator options from a raw argv and keep the rest for
    /// forwarding.
    ///
    /// ```
    /// use toolrig_core::context::ExecutionArgs;
    ///
    /// let raw: Vec<String> = ["--workspaces", "@app/*", "src", "--fix", "--no-graph"]
    ///     .map(String::from)
    ///     .to_vec();
    /// let args = ExecutionArgs::from_argv(&raw).unwrap();
    ///
    /// assert_eq!(args.workspaces.as_deref(), Some("@app/*"));
    /// assert_eq!(args.graph, Some(false));
    /// assert_eq!(args.argv, ["src", "--fix"]);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a non-numeric `--concurrency` or an
    /// unsplittable `--parallel` value.
    pub fn from_argv(raw: &[String]) -> Result<Self> {
        let raw = inline_parallel_values(raw);
        let raw = raw.as_slice();
        let orchestrator = ParsedArgs::parse_with_switches(raw, ORCHESTRATOR_SWITCHES);

        let workspaces = orchestrator.get("workspaces").and_then(|value| {
            value
                .as_str()
                .map(str::to_string)
                .or_else(|| value.is_truthy().then(|| "*".to_string()))
        });

        let concurrency = orchestrator
            .get("concurrency")
            .and_then(|v| v.as_str())
            .map(|v| match v.parse::<usize>() {
                Ok(0) => Err(Error::configuration("--concurrency must be at least 1")),
                Ok(n) => Ok(n),
                Err(_) => Err(Error::configuration(format!(
                    "--concurrency must be a number, got `{v}`"
                ))),
            })
            .transpose()?;

        let graph = orchestrator.get("graph").map(|v| v.is_truthy());

        let parallel = orchestrator
            .get("parallel")
            .map(|v| v.values())
            .unwrap_or_default()
            .iter()
            .map(|value| split_parallel(value))
            .collect::<Result<Vec<_>>>()?;

        let mut args = Self::new(strip_orchestrator_options(raw).filtered);
        args.workspaces = workspaces;
        args.concurrency = concurrency;
        args.graph = graph;
        args.parallel = parallel;
        Ok(args)
    }

    /// Whether a non-empty `--workspaces` filter was given.
    #[must_use]
    pub fn workspace_filter(&self) -> Option<&str> {
        self.workspaces
            .as_deref()
            .map(str::trim)
            .filter(|pattern| !pattern.is_empty())
    }
}

/// Rewrite `--parallel <value>` as `--parallel=<value>`; its values usually
/// start with a dash and would otherwise read as options.
fn inline_parallel_values(raw: &[String]) -> Vec<String> {
    let mut normalized = Vec::with_capacity(raw.len());
    let mut tokens = raw.iter();
    while let Some(token) = tokens.next() {
        match (token.as_str(), tokens.clone().next()) {
            ("--parallel", Some(value)) => {
                normalized.push(format!("--parallel={value}"));
                tokens.next();
            }
            _ => normalized.push(token.clone()),
        }
    }
    normalized
}

/// State threaded through the configure and execute phases.
///
/// One context is created per command. Fan-out clones it per workspace
/// package with [`ExecutionContext::for_package`]; clones never share mutable
/// state with the original.
#[derive(Clone)]
pub struct ExecutionContext {
    /// Invocation arguments.
    pub args: ExecutionArgs,
    /// Directory the tool runs in.
    pub cwd: PathBuf,
    /// Project root.
    pub root: PathBuf,
    /// Workspace root when running inside a workspace package.
    pub workspace_root: Option<PathBuf>,
    /// The package this context runs in, if any.
    pub package: Option<WorkspacePackage>,
    /// Drivers involved in the run, primary driver first.
    pub drivers: IndexMap<String, SharedDriver>,
    /// Config files produced so far.
    pub config_paths: Vec<ConfigPath>,
    /// Environment overlay for subprocesses.
    pub env: Environment,
}

impl ExecutionContext {
    /// Context for a command run at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, args: ExecutionArgs) -> Self {
        let root = root.into();
        Self {
            args,
            cwd: root.clone(),
            root,
            workspace_root: None,
            package: None,
            drivers: IndexMap::new(),
            config_paths: Vec::new(),
            env: Environment::new(),
        }
    }

    /// Clone for running inside `package`.
    #[must_use]
    pub fn for_package(&self, package: &WorkspacePackage) -> Self {
        Self {
            cwd: package.path.clone(),
            workspace_root: Some(self.root.clone()),
            package: Some(package.clone()),
            ..self.clone()
        }
    }

    /// Whether this context targets a workspace package.
    #[must_use]
    pub fn in_workspace_package(&self) -> bool {
        self.package.is_some()
    }

    /// Name used for logs and errors: the package name or the root directory.
    #[must_use]
    pub fn unit_name(&self) -> String {
        match &self.package {
            Some(package) => package.name.clone(),
            None => self
                .root
                .file_name()
                .map_or_else(|| "root".to_string(), |n| n.to_string_lossy().into_owned()),
        }
    }

    /// Record a produced config file. Recording the same file twice is a no-op.
    pub fn add_config_path(&mut self, driver: impl Into<String>, path: impl Into<PathBuf>) {
        let entry = ConfigPath {
            driver: driver.into(),
            path: path.into(),
        };
        if !self.config_paths.contains(&entry) {
            self.config_paths.push(entry);
        }
    }

    /// The most recent config file produced for `driver`.
    #[must_use]
    pub fn config_path_for(&self, driver: &str) -> Option<&Path> {
        self.config_paths
            .iter()
            .rev()
            .find(|c| c.driver == driver)
            .map(|c| c.path.as_path())
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("args", &self.args)
            .field("cwd", &self.cwd)
            .field("root", &self.root)
            .field("workspace_root", &self.workspace_root)
            .field("package", &self.package.as_ref().map(|p| &p.name))
            .field("drivers", &self.drivers.keys().collect::<Vec<_>>())
            .field("config_paths", &self.config_paths)
            .field("env", &self.env)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_from_argv_extracts_orchestrator_options() {
        let args = ExecutionArgs::from_argv(&argv(&[
            "--workspaces=*",
            "--concurrency",
            "4",
            "--parallel",
            "--grep 'unit tests'",
            "--parallel=--ci",
            "src",
        ]))
        .unwrap();

        assert_eq!(args.workspace_filter(), Some("*"));
        assert_eq!(args.concurrency, Some(4));
        assert_eq!(args.graph, None);
        assert_eq!(
            args.parallel,
            vec![argv(&["--grep", "unit tests"]), argv(&["--ci"])]
        );
        assert_eq!(args.argv, argv(&["src"]));
    }

    #[test]
    fn test_bare_workspaces_flag_means_all() {
        let args = ExecutionArgs::from_argv(&argv(&["--workspaces"])).unwrap();
        assert_eq!(args.workspace_filter(), Some("*"));
    }

    #[test]
    fn test_invalid_concurrency() {
        assert!(ExecutionArgs::from_argv(&argv(&["--concurrency", "lots"])).is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = ExecutionArgs::from_argv(&argv(&["--concurrency", "0", "src"])).unwrap_err();
        assert!(err.to_string().contains("at least 1"));
        assert_eq!(
            ExecutionArgs::from_argv(&argv(&["--concurrency", "3"]))
                .unwrap()
                .concurrency,
            Some(3)
        );
    }

    #[test]
    fn test_for_package_overrides_cwd_only() {
        let mut ctx = ExecutionContext::new("/repo", ExecutionArgs::new(argv(&["--fix"])));
        ctx.add_config_path("eslint", "/repo/.eslintrc.js");
        ctx.add_config_path("eslint", "/repo/.eslintrc.js");
        assert_eq!(ctx.config_paths.len(), 1);

        let package = WorkspacePackage::new("@repo/ui", "/repo/packages/ui");
        let child = ctx.for_package(&package);

        assert_eq!(child.cwd, PathBuf::from("/repo/packages/ui"));
        assert_eq!(child.root, PathBuf::from("/repo"));
        assert_eq!(child.workspace_root, Some(PathBuf::from("/repo")));
        assert_eq!(child.unit_name(), "@repo/ui");
        assert_eq!(
            child.config_path_for("eslint"),
            Some(Path::new("/repo/.eslintrc.js"))
        );
        assert!(!ctx.in_workspace_package());
        assert_eq!(ctx.unit_name(), "repo");
    }
}
