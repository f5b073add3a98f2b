//! Configure-then-execute orchestration across a project or its workspaces.

use crate::cleanup;
use crate::config::{self, ConfigArtifact};
use crate::context::{ExecutionArgs, ExecutionContext};
use crate::driver::{ConfigStrategy, DriverRegistry, SharedDriver, WorkspaceStrategy};
use crate::exec::{CommandRoutine, ExecOptions, ExecOutput};
use crate::pattern::is_match;
use crate::pipeline::{ExecutionUnit, RunOutcome, run_pipeline};
use crate::settings::ToolSettings;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use toolrig_workspaces::{WorkspacePackage, discover_workspace, has_workspace_declarations};

/// A project, its settings and the drivers available to it.
#[derive(Debug, Clone)]
pub struct Tool {
    root: PathBuf,
    settings: ToolSettings,
    registry: DriverRegistry,
}

impl Tool {
    /// Tool for `root`, with drivers defined by `settings`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, settings: ToolSettings) -> Self {
        let registry = DriverRegistry::from_settings(&settings);
        Self {
            root: root.into(),
            settings,
            registry,
        }
    }

    /// Load `.config/toolrig.toml` under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file is invalid.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let settings = ToolSettings::load(&root)?;
        Ok(Self::new(root, settings))
    }

    /// Use `registry`, with settings overrides applied on top of it.
    #[must_use]
    pub fn with_registry(mut self, mut registry: DriverRegistry) -> Self {
        registry.apply_settings(&self.settings);
        self.registry = registry;
        self
    }

    /// Project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loaded settings.
    #[must_use]
    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    /// Available drivers.
    #[must_use]
    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Fresh context for one command.
    #[must_use]
    pub fn context(&self, args: ExecutionArgs) -> ExecutionContext {
        ExecutionContext::new(&self.root, args)
    }

    /// Materialize configs for `drivers` and everything they depend on.
    ///
    /// Dependencies are configured before the drivers that need them. The
    /// resolved drivers are added to `ctx.drivers`.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown driver or a failed config resolution.
    pub async fn configure<S: AsRef<str>>(
        &self,
        ctx: &mut ExecutionContext,
        drivers: &[S],
        strategy: Option<ConfigStrategy>,
    ) -> Result<Vec<ConfigArtifact>> {
        let closure = self.registry.resolve_closure(drivers)?;
        for (name, driver) in &closure {
            ctx.drivers
                .entry(name.clone())
                .or_insert_with(|| SharedDriver::clone(driver));
        }

        let mut artifacts = Vec::new();
        for driver in closure.values().rev() {
            if let Some(artifact) = config::resolve_config(ctx, driver, &self.settings, strategy).await? {
                artifacts.push(artifact);
            }
        }

        tracing::info!(
            drivers = closure.len(),
            artifacts = artifacts.len(),
            "Configured drivers"
        );
        Ok(artifacts)
    }

    /// Configure `name`, run it, then clean up per the cleanup policy.
    ///
    /// # Errors
    ///
    /// Returns configuration errors before anything runs, or
    /// [`Error::Aggregate`] if any execution unit failed.
    pub async fn run_driver(
        &self,
        ctx: &mut ExecutionContext,
        name: &str,
    ) -> Result<RunOutcome<ExecOutput>> {
        let result = self.configure_and_execute(ctx, name).await;

        if self.settings.configure.cleanup.should_run(result.is_err()) {
            match cleanup::cleanup(ctx).await {
                Ok(removed) => tracing::debug!(removed, "Removed generated config files"),
                Err(e) => tracing::warn!(error = %e, "Cleanup did not complete"),
            }
        }

        result
    }

    async fn configure_and_execute(
        &self,
        ctx: &mut ExecutionContext,
        name: &str,
    ) -> Result<RunOutcome<ExecOutput>> {
        self.configure(ctx, &[name], None).await?;
        let driver = self.registry.get(name)?;
        let routine = CommandRoutine::new(SharedDriver::clone(&driver), &self.settings.execute);

        let concurrency = ctx
            .args
            .concurrency
            .unwrap_or(self.settings.execute.concurrency);
        let graph = ctx.args.graph.unwrap_or(self.settings.execute.graph);

        let Some(pattern) = ctx.args.workspace_filter().map(str::to_string) else {
            return self.run_single(ctx, &routine, concurrency).await;
        };

        if !has_workspace_declarations(&ctx.root) {
            return Err(toolrig_workspaces::Error::NoWorkspaceDeclarations {
                root: ctx.root.clone(),
            }
            .into());
        }

        let workspace = discover_workspace(&ctx.root)?;
        let matched: Vec<&WorkspacePackage> = workspace
            .packages
            .iter()
            .filter(|package| is_match(&package.name, &pattern))
            .collect();

        if matched.is_empty() {
            tracing::warn!(pattern = %pattern, "No workspace packages match");
            return Ok(RunOutcome::Workspace(Vec::new()));
        }
        tracing::info!(
            driver = %name,
            packages = matched.len(),
            graph,
            concurrency,
            "Running in workspaces"
        );

        let mut units = Vec::new();
        for package in &matched {
            let package_ctx = ctx.for_package(package);
            for extra in unit_argvs(&ctx.args) {
                units.push(package_unit(&routine, package_ctx.clone(), &package.name, extra));
            }
        }

        let result = run_pipeline(units, &workspace.packages, graph, concurrency).await;

        if driver.metadata().workspace_strategy == WorkspaceStrategy::Copy {
            record_package_copies(ctx, &matched);
        }

        result.map(RunOutcome::Workspace)
    }

    async fn run_single(
        &self,
        ctx: &ExecutionContext,
        routine: &CommandRoutine,
        concurrency: usize,
    ) -> Result<RunOutcome<ExecOutput>> {
        let key = ctx.unit_name();
        let units: Vec<_> = unit_argvs(&ctx.args)
            .into_iter()
            .map(|extra| package_unit(routine, ctx.clone(), &key, extra))
            .collect();
        let single = units.len() == 1;

        let mut results = run_pipeline(units, &[], false, concurrency).await?;
        match results.pop() {
            Some(result) if single => Ok(RunOutcome::Single(result)),
            Some(result) => {
                results.push(result);
                Ok(RunOutcome::Workspace(results))
            }
            None => Err(Error::configuration("No execution unit produced a result")),
        }
    }
}

/// One argv per unit: the plain invocation plus one per `--parallel` value.
fn unit_argvs(args: &ExecutionArgs) -> Vec<Vec<String>> {
    std::iter::once(Vec::new())
        .chain(args.parallel.iter().cloned())
        .collect()
}

fn package_unit(
    routine: &CommandRoutine,
    ctx: ExecutionContext,
    key: &str,
    additional_args: Vec<String>,
) -> ExecutionUnit<ExecOutput> {
    let routine = routine.clone().with_options(ExecOptions {
        additional_args,
        ..ExecOptions::default()
    });
    ExecutionUnit::new(key, async move { routine.run(&ctx).await })
}

/// Record the per-package copies of root artifacts so cleanup removes them.
fn record_package_copies(ctx: &mut ExecutionContext, packages: &[&WorkspacePackage]) {
    let copies: Vec<_> = ctx
        .config_paths
        .iter()
        .filter_map(|artifact| {
            let file_name = artifact.path.file_name()?;
            Some((artifact.driver.clone(), file_name.to_os_string()))
        })
        .flat_map(|(driver, file_name)| {
            packages
                .iter()
                .map(move |package| (driver.clone(), package.path.join(&file_name)))
        })
        .collect();

    for (driver, path) in copies {
        ctx.add_config_path(driver, path);
    }
}
