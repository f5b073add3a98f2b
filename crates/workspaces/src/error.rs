//! Error types for workspace operations.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for workspace operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during workspace operations.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Workspace root directory not found.
    #[error("Workspace not found at path: {path}")]
    #[diagnostic(
        code(toolrig::workspaces::workspace_not_found),
        help(
            "Ensure the path points to a valid workspace root directory with a workspace configuration file"
        )
    )]
    WorkspaceNotFound {
        /// The path that was searched.
        path: PathBuf,
    },

    /// The project root declares no workspaces at all.
    #[error("No workspaces are declared in {root}")]
    #[diagnostic(
        code(toolrig::workspaces::no_declarations),
        help(
            "Add a `workspaces` field to package.json or create pnpm-workspace.yaml before using --workspaces"
        )
    )]
    NoWorkspaceDeclarations {
        /// The project root that was inspected.
        root: PathBuf,
    },

    /// Invalid workspace configuration.
    #[error("Invalid workspace configuration at {path}: {message}")]
    #[diagnostic(
        code(toolrig::workspaces::invalid_config),
        help(
            "Check the workspace configuration file for syntax errors or missing required fields"
        )
    )]
    InvalidWorkspaceConfig {
        /// Path to the invalid configuration file.
        path: PathBuf,
        /// Description of what is invalid.
        message: String,
    },

    /// Two workspace packages share a name.
    #[error(transparent)]
    #[diagnostic(
        code(toolrig::workspaces::graph),
        help("Package names must be unique across the workspace")
    )]
    Graph(#[from] toolrig_graph::Error),

    /// I/O error occurred.
    #[error("I/O error during {operation}{}: {source}", path.as_ref().map(|p| format!(" at {}", p.display())).unwrap_or_default())]
    #[diagnostic(
        code(toolrig::workspaces::io_error),
        help(
            "Check that the referenced paths exist and that you have permission to read them"
        )
    )]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// Optional path where the error occurred.
        path: Option<PathBuf>,
        /// Description of the operation being performed.
        operation: String,
    },

    /// JSON parsing error.
    #[error("JSON parsing error{}: {source}", path.as_ref().map(|p| format!(" in {}", p.display())).unwrap_or_default())]
    #[diagnostic(
        code(toolrig::workspaces::json_error),
        help("Ensure the JSON has valid syntax and matches the package.json schema")
    )]
    Json {
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
        /// Optional path to the file being parsed.
        path: Option<PathBuf>,
    },

    /// YAML parsing error.
    #[error("YAML parsing error{}: {source}", path.as_ref().map(|p| format!(" in {}", p.display())).unwrap_or_default())]
    #[diagnostic(
        code(toolrig::workspaces::yaml_error),
        help("Ensure pnpm-workspace.yaml has valid syntax and a `packages` list")
    )]
    Yaml {
        /// The underlying YAML error.
        #[source]
        source: serde_yaml::Error,
        /// Optional path to the file being parsed.
        path: Option<PathBuf>,
    },
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            path: None,
            operation: "file operation".to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Self::Json { source, path: None }
    }
}
