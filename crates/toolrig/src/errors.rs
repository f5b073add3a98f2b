//! CLI-level failures and exit-code mapping.

use miette::Diagnostic;
use thiserror::Error;
use toolrig_core::error::INTERRUPTED_EXIT_CODE;

/// Failures raised by the binary itself rather than the pipeline.
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("Interrupted before the running tools stopped")]
    #[diagnostic(
        code(toolrig::cli::interrupted),
        help("Generated config files may be left behind; rerun the command to clean them up")
    )]
    Interrupted,

    #[error("Cannot determine the project root")]
    #[diagnostic(code(toolrig::cli::root), help("Pass --root explicitly"))]
    Root {
        #[source]
        source: std::io::Error,
    },
}

impl CliError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Interrupted => INTERRUPTED_EXIT_CODE,
            Self::Root { .. } => 1,
        }
    }
}

/// Exit code for a failed run.
pub fn exit_code(report: &miette::Report) -> i32 {
    if let Some(error) = report.downcast_ref::<toolrig_core::Error>() {
        return error.exit_code();
    }
    report
        .downcast_ref::<CliError>()
        .map_or(1, CliError::exit_code)
}
