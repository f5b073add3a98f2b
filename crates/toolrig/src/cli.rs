use crate::tracing::{LogLevel, TracingFormat};
use clap::{Args, Parser, Subcommand};
use toolrig_core::args::split_parallel;
use toolrig_core::{ExecutionArgs, OutputStrategy};

#[derive(Parser, Debug)]
#[command(name = "toolrig")]
#[command(about = "Generate tool configs and run developer tools across a monorepo")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(
        long,
        global = true,
        help = "Log format",
        default_value = "compact",
        value_enum
    )]
    pub format: TracingFormat,

    #[arg(long, global = true, help = "Output logs in JSON format")]
    pub json: bool,

    #[arg(
        long,
        global = true,
        help = "Project root (defaults to the current directory)"
    )]
    pub root: Option<std::path::PathBuf>,
}

impl Cli {
    /// Log format after applying `--json`.
    pub const fn log_format(&self) -> TracingFormat {
        if self.json {
            TracingFormat::Json
        } else {
            self.format
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Configure a driver, run its tool and clean up")]
    Run(RunArgs),
    #[command(about = "Generate config files for drivers without running them")]
    Configure {
        #[arg(required = true, help = "Drivers to configure")]
        drivers: Vec<String>,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[arg(
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "*",
        help = "Run in workspace packages matching a pattern (all when no pattern is given)"
    )]
    pub workspaces: Option<String>,

    #[arg(long, value_parser = clap::value_parser!(u16).range(1..), help = "Units run at once")]
    pub concurrency: Option<u16>,

    #[arg(long, overrides_with = "no_graph", help = "Order workspaces by dependencies")]
    pub graph: bool,

    #[arg(long = "no-graph", help = "Run workspaces without dependency ordering")]
    pub no_graph: bool,

    #[arg(
        long,
        allow_hyphen_values = true,
        help = "Extra arguments for an additional run per target (repeatable)"
    )]
    pub parallel: Vec<String>,

    #[arg(long, help = "Output strategy (buffer, stream, inherit)")]
    pub output: Option<OutputStrategy>,

    /// Driver name followed by the argv forwarded to its tool. Everything
    /// after the driver name is taken verbatim.
    #[arg(
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "DRIVER [ARGS]",
        help = "Driver to run, then arguments forwarded to the tool"
    )]
    pub command: Vec<String>,
}

impl RunArgs {
    pub fn driver(&self) -> &str {
        self.command.first().map_or("", String::as_str)
    }

    pub fn forwarded(&self) -> &[String] {
        self.command.get(1..).unwrap_or_default()
    }

    /// Execution args from the forwarded argv, with flags given before the
    /// driver name taking precedence.
    pub fn execution_args(&self) -> toolrig_core::Result<ExecutionArgs> {
        let mut args = ExecutionArgs::from_argv(self.forwarded())?;

        if self.workspaces.is_some() {
            args.workspaces.clone_from(&self.workspaces);
        }
        if let Some(concurrency) = self.concurrency {
            args.concurrency = Some(usize::from(concurrency));
        }
        if self.no_graph {
            args.graph = Some(false);
        } else if self.graph {
            args.graph = Some(true);
        }
        for value in &self.parallel {
            args.parallel.push(split_parallel(value)?);
        }
        if self.output.is_some() {
            args.output = self.output;
        }
        Ok(args)
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}
