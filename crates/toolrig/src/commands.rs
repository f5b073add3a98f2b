//! Command handlers.

use crate::cli::{Commands, RunArgs};
use std::path::PathBuf;
use toolrig_core::{ExecutionArgs, RunOutcome, Tool};
use tracing::Instrument;

/// Run one parsed command against the project at `root`.
pub async fn execute(command: Commands, root: PathBuf) -> miette::Result<()> {
    let tool = Tool::load(root)?;
    tracing::debug!(
        root = %tool.root().display(),
        drivers = tool.registry().names().len(),
        "Loaded project settings"
    );

    match command {
        Commands::Run(args) => {
            let span = crate::command_span!(format!("run {}", args.driver()));
            run(&tool, &args).instrument(span).await
        }
        Commands::Configure { drivers } => {
            let span = crate::command_span!(format!("configure {}", drivers.join(" ")));
            configure(&tool, &drivers).instrument(span).await
        }
    }
}

async fn run(tool: &Tool, args: &RunArgs) -> miette::Result<()> {
    let mut ctx = tool.context(args.execution_args()?);
    let outcome = tool.run_driver(&mut ctx, args.driver()).await?;

    match outcome {
        RunOutcome::Single(output) => tracing::info!(
            driver = %output.driver,
            duration_ms = u64::try_from(output.duration.as_millis()).unwrap_or(u64::MAX),
            "Run succeeded"
        ),
        RunOutcome::Workspace(outputs) => tracing::info!(
            driver = %args.driver(),
            units = outputs.len(),
            "Run succeeded in workspaces"
        ),
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
async fn configure(tool: &Tool, drivers: &[String]) -> miette::Result<()> {
    let mut ctx = tool.context(ExecutionArgs::default());
    let artifacts = tool.configure(&mut ctx, drivers, None).await?;

    for artifact in &artifacts {
        let path = artifact
            .path
            .strip_prefix(tool.root())
            .unwrap_or(&artifact.path);
        println!("{}\t{}", artifact.driver, path.display());
    }
    Ok(())
}
