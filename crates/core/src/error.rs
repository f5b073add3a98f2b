//! Error types for toolrig-core.

use miette::Diagnostic;
use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;
use thiserror::Error;

/// Number of lines from stdout/stderr to include when summarizing failures
pub const FAILURE_SNIPPET_LINES: usize = 20;

/// Exit code reported when a subprocess is killed by `SIGKILL`.
pub const OUT_OF_MEMORY_EXIT_CODE: i32 = 137;

/// Exit code reported when the run is interrupted from the terminal.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Result type alias for toolrig-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for orchestration.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Invalid settings, driver definitions, or arguments.
    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(toolrig::core::config),
        help("Check .config/toolrig.toml and the arguments passed to toolrig")
    )]
    Configuration {
        /// What is wrong.
        message: String,
    },

    /// A driver name that is not registered.
    #[error("Unknown driver `{name}`")]
    #[diagnostic(
        code(toolrig::core::unknown_driver),
        help("Declare it in .config/toolrig.toml under [drivers.{name}]")
    )]
    UnknownDriver {
        /// The requested driver.
        name: String,
    },

    /// A copy or reference strategy could not find a source file.
    #[error("No config source found for driver `{driver}` (searched {})", display_paths(.searched))]
    #[diagnostic(
        code(toolrig::core::missing_config_source),
        help("Add a config file to the module's configs/ directory or to .config/toolrig/")
    )]
    MissingConfigSource {
        /// The driver whose config is being materialized.
        driver: String,
        /// Every candidate that was checked.
        searched: Vec<PathBuf>,
    },

    /// The target or source extension has no serializer.
    #[error("Unsupported config format for {}: {reason}", path.display())]
    #[diagnostic(code(toolrig::core::unsupported_format))]
    UnsupportedFormat {
        /// The offending file.
        path: PathBuf,
        /// Why it cannot be handled.
        reason: String,
    },

    /// Workspace discovery or batching failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Workspace(#[from] toolrig_workspaces::Error),

    /// I/O error with the path and operation involved.
    #[error("I/O error during {operation}{}: {source}", path.as_ref().map(|p| format!(" at {}", p.display())).unwrap_or_default())]
    #[diagnostic(
        code(toolrig::core::io),
        help("Check that the path exists and that you have permission to access it")
    )]
    Io {
        /// The underlying error.
        #[source]
        source: std::io::Error,
        /// Path involved, if any.
        path: Option<PathBuf>,
        /// What was being done.
        operation: String,
    },

    /// JSON parse or serialization error.
    #[error("JSON error in {}: {source}", path.display())]
    #[diagnostic(code(toolrig::core::json))]
    Json {
        /// The underlying error.
        #[source]
        source: serde_json::Error,
        /// The file being handled.
        path: PathBuf,
    },

    /// TOML parse error.
    #[error("TOML parse error in {}: {source}", path.display())]
    #[diagnostic(code(toolrig::core::toml))]
    Toml {
        /// The underlying error.
        #[source]
        source: toml::de::Error,
        /// The file being parsed.
        path: PathBuf,
    },

    /// TOML serialization error.
    #[error("Cannot write {} as TOML: {source}", path.display())]
    #[diagnostic(
        code(toolrig::core::toml_write),
        help("TOML documents need a table at the top level and cannot contain null values")
    )]
    TomlWrite {
        /// The underlying error.
        #[source]
        source: toml::ser::Error,
        /// The target file.
        path: PathBuf,
    },

    /// YAML parse or serialization error.
    #[error("YAML error in {}: {source}", path.display())]
    #[diagnostic(code(toolrig::core::yaml))]
    Yaml {
        /// The underlying error.
        #[source]
        source: serde_yaml::Error,
        /// The file being handled.
        path: PathBuf,
    },

    /// A wrapped tool failed for one execution unit.
    #[error("{unit}: {source}")]
    #[diagnostic(code(toolrig::core::exec))]
    Exec {
        /// The unit key (package or driver name).
        unit: String,
        /// What went wrong with the subprocess.
        #[source]
        source: ExecError,
    },

    /// Every failure of a pipeline run, combined.
    #[error("{} execution unit(s) failed:\n\n{}", messages.len(), messages.join("\n\n"))]
    #[diagnostic(
        code(toolrig::core::pipeline_failed),
        help("Run with RUST_LOG=debug for the full subprocess output")
    )]
    Aggregate {
        /// Primary message of each failure, stack traces removed.
        messages: Vec<String>,
        /// Exit code the process should finish with.
        exit_code: i32,
    },

    /// A spawned unit panicked or was cancelled.
    #[error("Execution unit `{unit}` did not complete: {message}")]
    #[diagnostic(code(toolrig::core::join))]
    Join {
        /// The unit key.
        unit: String,
        /// Join error text.
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create an I/O error with context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl Into<Option<PathBuf>>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: path.into(),
            operation: operation.into(),
        }
    }

    /// Wrap a subprocess failure with the unit it belongs to
    #[must_use]
    pub fn exec(unit: impl Into<String>, source: ExecError) -> Self {
        Self::Exec {
            unit: unit.into(),
            source,
        }
    }

    /// Combine the failures of a run into one error.
    ///
    /// A lone failure keeps its own exit code; any interrupt wins with 130;
    /// otherwise the combined exit code is 1.
    #[must_use]
    pub fn aggregate(errors: &[Self]) -> Self {
        let messages = errors
            .iter()
            .map(|e| strip_stack_trace(&e.to_string()))
            .collect();

        let exit_code = if errors.iter().any(Self::is_interrupted) {
            INTERRUPTED_EXIT_CODE
        } else if let [only] = errors {
            only.exit_code()
        } else {
            1
        };

        Self::Aggregate {
            messages,
            exit_code,
        }
    }

    /// The process exit code this error should produce.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Exec { source, .. } => source.exit_code(),
            Self::Aggregate { exit_code, .. } => *exit_code,
            _ => 1,
        }
    }

    fn is_interrupted(&self) -> bool {
        matches!(
            self,
            Self::Exec {
                source: ExecError::Interrupted { .. },
                ..
            }
        )
    }
}

/// How a wrapped tool's subprocess failed.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The binary could not be started.
    #[error("Failed to spawn `{bin}`: {source}")]
    Spawn {
        /// The binary that was invoked.
        bin: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Non-zero exit.
    #[error("{}", summarize_failure(.command, .exit_code, .stdout, .stderr))]
    Failed {
        /// The command line that ran.
        command: String,
        /// Its exit code.
        exit_code: i32,
        /// Captured stdout (empty unless buffered).
        stdout: String,
        /// Captured stderr (empty unless buffered).
        stderr: String,
    },

    /// Killed by `SIGKILL` without an exit code.
    #[error("`{command}` was killed by SIGKILL, most likely because it ran out of memory")]
    OutOfMemory {
        /// The command line that ran.
        command: String,
    },

    /// Terminated by some other signal.
    #[error("`{command}` was terminated by signal {signal}")]
    Signal {
        /// The command line that ran.
        command: String,
        /// The signal number.
        signal: i32,
    },

    /// Captured output exceeded `execute.max_buffer`.
    #[error("`{command}` produced more than {limit} bytes of output")]
    BufferExceeded {
        /// The command line that ran.
        command: String,
        /// The configured limit in bytes.
        limit: usize,
    },

    /// The run was interrupted before the subprocess finished.
    #[error("`{command}` was interrupted")]
    Interrupted {
        /// The command line that ran.
        command: String,
    },
}

impl ExecError {
    /// The process exit code this failure maps to.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Failed { exit_code, .. } => *exit_code,
            Self::OutOfMemory { .. } => OUT_OF_MEMORY_EXIT_CODE,
            Self::Signal { signal, .. } => 128 + signal,
            Self::Interrupted { .. } => INTERRUPTED_EXIT_CODE,
            Self::Spawn { .. } | Self::BufferExceeded { .. } => 1,
        }
    }

    /// Whether the failure carries output worth echoing to the console.
    #[must_use]
    pub fn is_echoable(&self) -> bool {
        !matches!(self, Self::BufferExceeded { .. })
    }
}

static STACK_FRAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s+at\s").ok());

/// Drop stack-trace frames (`    at fn (file:line)`) from a message.
#[must_use]
pub fn strip_stack_trace(message: &str) -> String {
    let Some(frame) = STACK_FRAME.as_ref() else {
        return message.trim_end().to_string();
    };

    message
        .lines()
        .filter(|line| !frame.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

/// Render a failed command with the tail of its output.
pub fn summarize_failure(
    command: &str,
    exit_code: impl fmt::Display,
    stdout: &str,
    stderr: &str,
) -> String {
    let mut sections = vec![format!("`{command}` failed with exit code {exit_code}.")];

    sections.extend(summarize_stream("stdout", stdout, FAILURE_SNIPPET_LINES));
    sections.extend(summarize_stream("stderr", stderr, FAILURE_SNIPPET_LINES));

    sections.join("\n\n")
}

fn summarize_stream(label: &str, content: &str, max_output_lines: usize) -> Option<String> {
    let normalized = content.trim_end();
    if normalized.is_empty() {
        return None;
    }

    let lines: Vec<&str> = normalized.lines().collect();
    let total = lines.len();
    let start = total.saturating_sub(max_output_lines);
    let snippet = lines[start..].join("\n");

    let header = if total > max_output_lines {
        format!("{label} (last {max_output_lines} of {total} lines):")
    } else {
        format!("{label}:")
    };

    Some(format!("{header}\n{snippet}"))
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(code: i32, stderr: &str) -> Error {
        Error::exec(
            "pkg",
            ExecError::Failed {
                command: "eslint .".into(),
                exit_code: code,
                stdout: String::new(),
                stderr: stderr.into(),
            },
        )
    }

    #[test]
    fn test_strip_stack_trace() {
        let message = "Error: X\n    at run (index.js:1:1)\n    at main (index.js:9:2)";
        assert_eq!(strip_stack_trace(message), "Error: X");
    }

    #[test]
    fn test_failure_summary_keeps_tail() {
        let stderr: String = (1..=30).map(|i| format!("line {i}\n")).collect();
        let summary = summarize_failure("tsc", 2, "", &stderr);

        assert!(summary.starts_with("`tsc` failed with exit code 2."));
        assert!(summary.contains("stderr (last 20 of 30 lines):"));
        assert!(summary.contains("line 30"));
        assert!(!summary.contains("line 10\n"));
        assert!(!summary.contains("stdout"));
    }

    #[test]
    fn test_aggregate_single_failure_keeps_exit_code() {
        let err = Error::aggregate(&[failed(3, "boom")]);
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_aggregate_many_failures_exit_one() {
        let err = Error::aggregate(&[failed(3, "a"), failed(4, "b")]);
        assert_eq!(err.exit_code(), 1);
        let Error::Aggregate { messages, .. } = err else {
            panic!("expected aggregate");
        };
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn test_interrupt_wins() {
        let interrupted = Error::exec(
            "pkg",
            ExecError::Interrupted {
                command: "jest".into(),
            },
        );
        let err = Error::aggregate(&[failed(2, "x"), interrupted]);
        assert_eq!(err.exit_code(), INTERRUPTED_EXIT_CODE);
    }

    #[test]
    fn test_exec_error_exit_codes() {
        let oom = ExecError::OutOfMemory {
            command: "node".into(),
        };
        assert_eq!(oom.exit_code(), 137);

        let signal = ExecError::Signal {
            command: "node".into(),
            signal: 15,
        };
        assert_eq!(signal.exit_code(), 143);

        let overflow = ExecError::BufferExceeded {
            command: "node".into(),
            limit: 10,
        };
        assert!(!overflow.is_echoable());
        assert_eq!(overflow.exit_code(), 1);
    }
}
