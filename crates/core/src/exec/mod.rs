//! Command execution for one execution unit.
//!
//! [`CommandRoutine::run`] prepares the final argv for a driver's binary
//! (driver args, forwarded argv, unit argv, glob expansion, unknown-option
//! filtering, config flag), spawns it with the context's environment overlay
//! and routes the outcome through the driver's success or failure handling.

pub mod process;

use crate::args::{FilterOptions, ParsedArgs, filter_args};
use crate::context::ExecutionContext;
use crate::driver::{SharedDriver, WorkspaceStrategy};
use crate::error::ExecError;
use crate::pattern::{contains_glob, expand_braces};
use crate::settings::{ExecuteSettings, OutputStrategy};
use crate::{Error, Result};
use process::{OutputMode, ProcessSpec};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    /// Driver that ran.
    pub driver: String,
    /// Unit name (package or project).
    pub unit: String,
    /// The command line that ran.
    pub command: String,
    /// Exit code (0).
    pub exit_code: i32,
    /// Captured stdout; empty unless buffered.
    pub stdout: String,
    /// Captured stderr; empty unless buffered.
    pub stderr: String,
    /// Wall time of the subprocess.
    pub duration: Duration,
}

/// Per-unit execution options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Argv appended after the forwarded argv, from `--parallel`.
    pub additional_args: Vec<String>,
    /// Run somewhere other than the context's directory.
    pub cwd: Option<PathBuf>,
    /// Pass `<config_option> <path>` even if the driver does not ask for it.
    pub force_config_option: bool,
    /// Force watch mode on or off instead of detecting it.
    pub watch: Option<bool>,
}

/// Runs one driver's binary for one execution unit.
#[derive(Clone)]
pub struct CommandRoutine {
    driver: SharedDriver,
    settings: ExecuteSettings,
    options: ExecOptions,
}

impl CommandRoutine {
    /// Routine running `driver` with default options.
    #[must_use]
    pub fn new(driver: SharedDriver, settings: &ExecuteSettings) -> Self {
        Self {
            driver,
            settings: settings.clone(),
            options: ExecOptions::default(),
        }
    }

    /// Replace the execution options.
    #[must_use]
    pub fn with_options(mut self, options: ExecOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the driver's binary in `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Exec`] when the subprocess fails, or an argument
    /// preparation error before anything is spawned.
    pub async fn run(&self, ctx: &ExecutionContext) -> Result<ExecOutput> {
        let metadata = self.driver.metadata();
        let unit = ctx.unit_name();
        let cwd = self.options.cwd.clone().unwrap_or_else(|| ctx.cwd.clone());

        let (argv, parsed) = self.gather_args(ctx);
        let argv = expand_globs(&argv, &cwd)?;
        let mut argv = self.filter_unknown_options(ctx, argv).await?;
        self.apply_workspace_config(ctx, &cwd, &mut argv).await?;
        self.driver.on_before_execute(ctx, &mut argv);

        let mut env = ctx.env.clone();
        env.extend(metadata.env.clone());

        let spec = ProcessSpec {
            bin: metadata.bin.clone(),
            args: argv,
            cwd,
            env: env.merge_with_system(),
            mode: self.output_mode(ctx, &parsed),
            max_buffer: self.settings.max_buffer,
            prefix: ctx.in_workspace_package().then(|| unit.clone()),
        };
        let command = spec.command_line();

        crate::emit_execute_started!(metadata.name, unit, command);
        let started = Instant::now();

        match process::run_process(&spec).await {
            Ok(output) => {
                let output = ExecOutput {
                    driver: metadata.name.clone(),
                    unit,
                    command,
                    exit_code: output.exit_code,
                    stdout: output.stdout,
                    stderr: output.stderr,
                    duration: started.elapsed(),
                };
                self.driver.process_success(&output);
                self.driver.on_after_execute(ctx, &output);
                crate::emit_execute_completed!(
                    metadata.name,
                    output.unit,
                    u64::try_from(output.duration.as_millis()).unwrap_or(u64::MAX)
                );
                Ok(output)
            }
            Err(error) => {
                if error.is_echoable() {
                    self.driver.process_failure(&error);
                }
                self.driver.on_failed_execute(ctx, &error);
                crate::emit_execute_failed!(metadata.name, unit, error.exit_code());
                Err(Error::exec(unit, error))
            }
        }
    }

    /// Driver args, forwarded argv and unit argv, in that order, plus the
    /// parsed view merged over the context's.
    #[must_use]
    pub fn gather_args(&self, ctx: &ExecutionContext) -> (Vec<String>, ParsedArgs) {
        let mut argv = self.driver.args();
        argv.extend(ctx.args.argv.iter().cloned());
        argv.extend(self.options.additional_args.iter().cloned());

        let mut parsed = ctx.args.parsed.clone();
        parsed.merge(ParsedArgs::parse(&argv));
        (argv, parsed)
    }

    async fn filter_unknown_options(
        &self,
        ctx: &ExecutionContext,
        argv: Vec<String>,
    ) -> Result<Vec<String>> {
        if !self.driver.metadata().filter_options {
            return Ok(argv);
        }

        let supported = self.driver.supported_options(ctx).await?;
        let result = filter_args(&argv, &FilterOptions::allow(supported));
        if !result.unknown.is_empty() {
            tracing::warn!(
                driver = %self.driver.name(),
                dropped = %result.unknown.join(" "),
                "Dropping options the tool does not support"
            );
        }
        Ok(result.filtered)
    }

    /// Copy artifacts into the package, or point the tool at its config.
    async fn apply_workspace_config(
        &self,
        ctx: &ExecutionContext,
        cwd: &Path,
        argv: &mut Vec<String>,
    ) -> Result<()> {
        let metadata = self.driver.metadata();

        if ctx.in_workspace_package() && metadata.workspace_strategy == WorkspaceStrategy::Copy {
            for artifact in &ctx.config_paths {
                let Some(file_name) = artifact.path.file_name() else {
                    continue;
                };
                let destination = cwd.join(file_name);
                if destination == artifact.path {
                    continue;
                }
                tokio::fs::copy(&artifact.path, &destination)
                    .await
                    .map_err(|e| Error::io(e, destination.clone(), "copy config into package"))?;
                tracing::debug!(
                    driver = %artifact.driver,
                    path = %destination.display(),
                    "Copied config into package"
                );
            }
            return Ok(());
        }

        if (metadata.use_config_option || self.options.force_config_option)
            && let Some(path) = ctx.config_path_for(&metadata.name)
        {
            argv.push(metadata.config_option.clone());
            argv.push(path.display().to_string());
        }
        Ok(())
    }

    fn output_mode(&self, ctx: &ExecutionContext, parsed: &ParsedArgs) -> OutputMode {
        if self.is_watch(parsed) {
            return OutputMode::Watch;
        }
        match ctx.args.output.unwrap_or(self.settings.output) {
            OutputStrategy::Buffer => OutputMode::Buffer,
            OutputStrategy::Stream => OutputMode::Stream,
            OutputStrategy::Inherit => OutputMode::Inherit,
        }
    }

    /// Whether the invocation puts the tool in watch mode.
    #[must_use]
    pub fn is_watch(&self, parsed: &ParsedArgs) -> bool {
        if let Some(watch) = self.options.watch {
            return watch;
        }
        self.driver.metadata().watch_options.iter().any(|option| {
            parsed.is_enabled(option) || parsed.positionals.iter().any(|p| p == option)
        })
    }
}

/// Replace each non-flag glob token with the files it matches under `cwd`,
/// relative to `cwd`. A glob matching nothing is removed, and entries that
/// cannot be read are logged and skipped.
///
/// # Errors
///
/// Returns a configuration error for a malformed pattern.
pub fn expand_globs(argv: &[String], cwd: &Path) -> Result<Vec<String>> {
    let mut expanded = Vec::with_capacity(argv.len());
    // cwd is matched literally, only the token is a pattern
    let base = PathBuf::from(glob::Pattern::escape(&cwd.to_string_lossy()));

    for token in argv {
        if token.starts_with('-') || !contains_glob(token) {
            expanded.push(token.clone());
            continue;
        }

        let before = expanded.len();
        for pattern in expand_braces(token) {
            let absolute = base.join(&pattern);
            let entries = glob::glob(&absolute.to_string_lossy()).map_err(|e| {
                Error::configuration(format!("Invalid glob `{token}`: {e}"))
            })?;
            for entry in entries {
                match entry {
                    Ok(path) => {
                        let relative = path.strip_prefix(cwd).unwrap_or(&path);
                        expanded.push(relative.display().to_string());
                    }
                    Err(e) => tracing::warn!(
                        pattern = %token,
                        path = %e.path().display(),
                        error = %e.error(),
                        "Skipping unreadable path while expanding glob"
                    ),
                }
            }
        }

        if expanded.len() == before {
            tracing::debug!(pattern = %token, "Glob matched no files");
        }
    }

    Ok(expanded)
}

impl std::fmt::Debug for CommandRoutine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRoutine")
            .field("driver", &self.driver.name())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
