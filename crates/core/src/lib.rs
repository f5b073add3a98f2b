//! Workspace-aware execution pipeline for toolrig.
//!
//! toolrig wraps third-party developer tools. For each run it generates the
//! tool's config file, invokes its binary as a subprocess, and, in a
//! monorepo, fans that out over the selected workspace packages in
//! dependency order with bounded concurrency.
//!
//! # Phases
//!
//! ```text
//! configure ──► execute (per batch, bounded pool) ──► aggregate ──► cleanup
//! ```
//!
//! - [`orchestrator::Tool::configure`] resolves the driver dependency closure
//!   and materializes configs ([`config`]).
//! - [`orchestrator::Tool::run_driver`] builds one [`pipeline::ExecutionUnit`]
//!   per package (and per `--parallel` value), batches them by the workspace
//!   dependency graph and runs each batch through [`pipeline::pool`].
//! - Failures are collected into one [`Error::Aggregate`]; [`cleanup`]
//!   removes generated files according to the cleanup policy.
//!
//! # Example
//!
//! ```rust,ignore
//! use toolrig_core::{ExecutionArgs, Tool};
//!
//! let tool = Tool::load(root)?;
//! let args = ExecutionArgs::from_argv(&argv)?;
//! let mut ctx = tool.context(args);
//! let outcome = tool.run_driver(&mut ctx, "eslint").await?;
//! ```

pub mod args;
pub mod cleanup;
pub mod config;
pub mod console;
pub mod context;
pub mod driver;
pub mod environment;
pub mod error;
pub mod events;
pub mod exec;
pub mod orchestrator;
pub mod pattern;
pub mod pipeline;
pub mod settings;

pub use args::{FilterOptions, FilteredArgs, ParsedArgs, filter_args};
pub use config::ConfigArtifact;
pub use context::{ConfigPath, ExecutionArgs, ExecutionContext};
pub use driver::{
    ConfigStrategy, ConfiguredDriver, Driver, DriverHooks, DriverMetadata, DriverRegistry,
    SharedDriver, WorkspaceStrategy,
};
pub use environment::Environment;
pub use error::{Error, ExecError, Result};
pub use exec::{CommandRoutine, ExecOptions, ExecOutput};
pub use orchestrator::Tool;
pub use pattern::is_match;
pub use pipeline::{ExecutionUnit, RunOutcome};
pub use settings::{CleanupPolicy, OutputStrategy, ToolSettings};
