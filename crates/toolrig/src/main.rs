//! toolrig command line entry point.

mod cli;
mod commands;
mod errors;
mod shutdown;
mod tracing;

use crate::errors::CliError;
use crate::tracing::TracingConfig;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match run_main().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            let code = errors::exit_code(&report);
            #[allow(clippy::print_stderr)]
            {
                eprintln!("{report:?}");
            }
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn run_main() -> miette::Result<()> {
    let cli = cli::parse();

    crate::tracing::init_tracing(&TracingConfig {
        format: cli.log_format(),
        level: cli.level.into(),
        filter: None,
    })?;

    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().map_err(|source| CliError::Root { source })?,
    };

    tokio::select! {
        result = commands::execute(cli.command, root) => result,
        () = shutdown::forced_shutdown(shutdown::GRACE_PERIOD) => Err(CliError::Interrupted.into()),
    }
}
