//! Lifecycle events for config resolution and command execution.
//!
//! Every lifecycle point a driver can hook into is also emitted as a
//! structured tracing event with a fixed target and an `event_type` field,
//! so subscribers can follow a run without registering driver hooks.
//!
//! ```rust,ignore
//! use toolrig_core::emit_config_file;
//!
//! emit_config_file!("eslint", "create", path.display());
//! ```
//!
//! Configure-phase events use the `toolrig::config` target, execute-phase
//! events use `toolrig::exec`.

/// Emit a config source loaded event (`config.load_module` or `config.load_package`).
#[macro_export]
macro_rules! emit_config_loaded {
    ($driver:expr, $kind:literal, $source:expr) => {
        ::tracing::debug!(
            target: "toolrig::config",
            event_type = concat!("config.load_", $kind),
            driver = %$driver,
            source = %$source,
        )
    };
}

/// Emit a config merged event.
#[macro_export]
macro_rules! emit_config_merged {
    ($driver:expr, $sources:expr) => {
        ::tracing::debug!(
            target: "toolrig::config",
            event_type = "config.merge",
            driver = %$driver,
            sources = $sources,
        )
    };
}

/// Emit a config file written event.
///
/// # Example
/// ```rust,ignore
/// emit_config_file!("babel", "copy", "/repo/babel.config.js");
/// ```
#[macro_export]
macro_rules! emit_config_file {
    ($driver:expr, $strategy:expr, $path:expr) => {
        ::tracing::info!(
            target: "toolrig::config",
            event_type = "config.file_written",
            driver = %$driver,
            strategy = %$strategy,
            path = %$path,
        )
    };
}

/// Emit a config file deleted event.
#[macro_export]
macro_rules! emit_config_deleted {
    ($driver:expr, $path:expr) => {
        ::tracing::info!(
            target: "toolrig::config",
            event_type = "config.file_deleted",
            driver = %$driver,
            path = %$path,
        )
    };
}

/// Emit an execution started event.
#[macro_export]
macro_rules! emit_execute_started {
    ($driver:expr, $unit:expr, $command:expr) => {
        ::tracing::info!(
            target: "toolrig::exec",
            event_type = "execute.started",
            driver = %$driver,
            unit = %$unit,
            command = %$command,
        )
    };
}

/// Emit an execution completed event.
#[macro_export]
macro_rules! emit_execute_completed {
    ($driver:expr, $unit:expr, $duration_ms:expr) => {
        ::tracing::info!(
            target: "toolrig::exec",
            event_type = "execute.completed",
            driver = %$driver,
            unit = %$unit,
            duration_ms = $duration_ms,
        )
    };
}

/// Emit an execution failed event.
#[macro_export]
macro_rules! emit_execute_failed {
    ($driver:expr, $unit:expr, $exit_code:expr) => {
        ::tracing::warn!(
            target: "toolrig::exec",
            event_type = "execute.failed",
            driver = %$driver,
            unit = %$unit,
            exit_code = $exit_code,
        )
    };
}

/// Emit a batch scheduled event.
#[macro_export]
macro_rules! emit_batch_started {
    ($index:expr, $size:expr) => {
        ::tracing::debug!(
            target: "toolrig::exec",
            event_type = "batch.started",
            batch = $index,
            units = $size,
        )
    };
}
