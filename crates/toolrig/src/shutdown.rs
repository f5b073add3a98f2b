//! Ctrl-C handling for the whole command.
//!
//! Running subprocesses see the first Ctrl-C themselves and wind down, which
//! lets the pipeline aggregate their failures and clean up. The command is
//! only abandoned if it has not finished after a grace period, or on a second
//! Ctrl-C.

use std::time::Duration;
use tokio::signal;

/// How long a command may take to stop after the first Ctrl-C.
pub const GRACE_PERIOD: Duration = Duration::from_secs(5);

async fn ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
}

/// Resolves once the command should be abandoned.
pub async fn forced_shutdown(grace: Duration) {
    ctrl_c().await;
    tracing::warn!(
        grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
        "Interrupted, waiting for running tools to stop"
    );

    tokio::select! {
        () = ctrl_c() => tracing::warn!("Second interrupt, exiting"),
        () = tokio::time::sleep(grace) => tracing::warn!("Tools did not stop in time, exiting"),
    }
}
