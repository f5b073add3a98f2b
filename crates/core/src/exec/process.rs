//! Subprocess spawning, output capture and exit classification.

use crate::console;
use crate::context::ExecutionContext;
use crate::error::ExecError;
use crate::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

/// How long watch-mode output is coalesced before it is written.
pub const WATCH_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// What happens to a subprocess's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Capture everything up to the buffer limit.
    Buffer,
    /// Write each line through as it arrives.
    Stream,
    /// Hand the terminal to the subprocess.
    Inherit,
    /// Write lines through in batches on a timer.
    Watch,
}

/// A fully prepared subprocess.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    /// Binary to run.
    pub bin: String,
    /// Its arguments.
    pub args: Vec<String>,
    /// Working directory.
    pub cwd: PathBuf,
    /// Complete environment for the child.
    pub env: HashMap<String, String>,
    /// Output handling.
    pub mode: OutputMode,
    /// Per-stream byte limit in buffer mode.
    pub max_buffer: usize,
    /// Line prefix for stream and watch modes.
    pub prefix: Option<String>,
}

impl ProcessSpec {
    /// The command line, shell-quoted.
    #[must_use]
    pub fn command_line(&self) -> String {
        let tokens = std::iter::once(self.bin.as_str()).chain(self.args.iter().map(String::as_str));
        shlex::try_join(tokens.clone()).unwrap_or_else(|_| tokens.collect::<Vec<_>>().join(" "))
    }
}

/// Output of a successful subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code (always 0 on success).
    pub exit_code: i32,
    /// Captured stdout; empty unless buffered.
    pub stdout: String,
    /// Captured stderr; empty unless buffered.
    pub stderr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

#[derive(Default)]
struct Captured {
    stdout: String,
    stderr: String,
}

impl Captured {
    fn push(&mut self, stream: Stream, line: &str) -> usize {
        let buffer = match stream {
            Stream::Stdout => &mut self.stdout,
            Stream::Stderr => &mut self.stderr,
        };
        buffer.push_str(line);
        buffer.push('\n');
        buffer.len()
    }

    fn flush(&mut self) {
        console::write_stdout(&std::mem::take(&mut self.stdout));
        console::write_stderr(&std::mem::take(&mut self.stderr));
    }
}

/// Run `spec` to completion.
///
/// A Ctrl-C while the child runs kills it and returns
/// [`ExecError::Interrupted`]; in buffer mode the output captured so far is
/// written to the console first.
///
/// # Errors
///
/// Returns the classified failure: spawn error, non-zero exit, signal
/// termination, buffer overflow or interrupt.
pub async fn run_process(spec: &ProcessSpec) -> std::result::Result<ProcessOutput, ExecError> {
    let command = spec.command_line();
    let mut cmd = Command::new(&spec.bin);
    cmd.args(&spec.args)
        .current_dir(&spec.cwd)
        .env_clear()
        .envs(&spec.env)
        .stdin(Stdio::inherit())
        .kill_on_drop(true);

    if spec.mode == OutputMode::Inherit {
        cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    } else {
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    }

    let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
        bin: spec.bin.clone(),
        source,
    })?;

    let (status, captured) = if spec.mode == OutputMode::Inherit {
        (wait_inherited(&mut child, spec, &command).await?, Captured::default())
    } else {
        drive_piped(&mut child, spec, &command).await?
    };

    classify(status, command, captured)
}

async fn wait_inherited(
    child: &mut Child,
    spec: &ProcessSpec,
    command: &str,
) -> std::result::Result<ExitStatus, ExecError> {
    tokio::select! {
        status = child.wait() => status.map_err(|source| ExecError::Spawn {
            bin: spec.bin.clone(),
            source,
        }),
        () = interrupted() => {
            let _ = child.kill().await;
            Err(ExecError::Interrupted { command: command.to_string() })
        }
    }
}

async fn drive_piped(
    child: &mut Child,
    spec: &ProcessSpec,
    command: &str,
) -> std::result::Result<(ExitStatus, Captured), ExecError> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    if let Some(stdout) = child.stdout.take() {
        spawn_reader(stdout, Stream::Stdout, tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_reader(stderr, Stream::Stderr, tx);
    }

    let mut captured = Captured::default();
    let mut pending: Vec<(Stream, String)> = Vec::new();
    let mut status = None;
    let mut ticker = tokio::time::interval(WATCH_FLUSH_INTERVAL);
    let interrupt = interrupted();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            line = rx.recv() => {
                let Some((stream, line)) = line else { break };
                match spec.mode {
                    OutputMode::Buffer => {
                        if captured.push(stream, &line) > spec.max_buffer {
                            let _ = child.kill().await;
                            return Err(ExecError::BufferExceeded {
                                command: command.to_string(),
                                limit: spec.max_buffer,
                            });
                        }
                    }
                    OutputMode::Watch => pending.push((stream, line)),
                    OutputMode::Stream | OutputMode::Inherit => {
                        console::write_line(spec.prefix.as_deref(), &line, stream == Stream::Stderr);
                    }
                }
            }
            exited = child.wait(), if status.is_none() => {
                status = Some(exited.map_err(|source| ExecError::Spawn {
                    bin: spec.bin.clone(),
                    source,
                })?);
            }
            _ = ticker.tick(), if spec.mode == OutputMode::Watch => {
                flush_pending(spec, &mut pending);
            }
            () = &mut interrupt => {
                let _ = child.kill().await;
                flush_pending(spec, &mut pending);
                captured.flush();
                return Err(ExecError::Interrupted { command: command.to_string() });
            }
        }
    }

    flush_pending(spec, &mut pending);
    let status = match status {
        Some(status) => status,
        None => child.wait().await.map_err(|source| ExecError::Spawn {
            bin: spec.bin.clone(),
            source,
        })?,
    };
    Ok((status, captured))
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn spawn_reader<R>(reader: R, stream: Stream, tx: mpsc::UnboundedSender<(Stream, String)>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send((stream, decode_line(&buf))).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(stream = ?stream, error = %e, "Stopped reading subprocess output");
                    break;
                }
            }
        }
    });
}

/// One output line without its terminator; invalid UTF-8 is replaced.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

fn flush_pending(spec: &ProcessSpec, pending: &mut Vec<(Stream, String)>) {
    for (stream, line) in pending.drain(..) {
        console::write_line(spec.prefix.as_deref(), &line, stream == Stream::Stderr);
    }
}

fn classify(
    status: ExitStatus,
    command: String,
    captured: Captured,
) -> std::result::Result<ProcessOutput, ExecError> {
    if status.success() {
        return Ok(ProcessOutput {
            exit_code: 0,
            stdout: captured.stdout,
            stderr: captured.stderr,
        });
    }

    if let Some(exit_code) = status.code() {
        return Err(ExecError::Failed {
            command,
            exit_code,
            stdout: captured.stdout,
            stderr: captured.stderr,
        });
    }

    match termination_signal(status) {
        Some(9) => Err(ExecError::OutOfMemory { command }),
        Some(signal) => Err(ExecError::Signal { command, signal }),
        None => Err(ExecError::Failed {
            command,
            exit_code: 1,
            stdout: captured.stdout,
            stderr: captured.stderr,
        }),
    }
}

#[cfg(unix)]
fn termination_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn termination_signal(_status: ExitStatus) -> Option<i32> {
    None
}

/// Run `<bin> <help_option>` in the context's directory and return its help
/// text. Tools that print help to stderr are handled.
///
/// `driver_env` is layered over the context's environment, the same way it is
/// for the real run.
///
/// # Errors
///
/// Returns an error if the binary cannot be spawned.
pub async fn capture_help(
    bin: &str,
    help_option: &str,
    ctx: &ExecutionContext,
    driver_env: &HashMap<String, String>,
) -> Result<String> {
    let mut env = ctx.env.clone();
    env.extend(driver_env.clone());

    let output = Command::new(bin)
        .arg(help_option)
        .current_dir(&ctx.cwd)
        .env_clear()
        .envs(env.merge_with_system())
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| {
            Error::exec(
                ctx.unit_name(),
                ExecError::Spawn {
                    bin: bin.to_string(),
                    source,
                },
            )
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if stdout.trim().is_empty() {
        Ok(String::from_utf8_lossy(&output.stderr).into_owned())
    } else {
        Ok(stdout.into_owned())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn spec(script: &str, mode: OutputMode) -> ProcessSpec {
        ProcessSpec {
            bin: "sh".into(),
            args: vec!["-c".into(), script.into()],
            cwd: std::env::temp_dir(),
            env: std::env::vars().collect(),
            mode,
            max_buffer: 1024,
            prefix: None,
        }
    }

    #[tokio::test]
    async fn test_buffer_captures_both_streams() {
        let output = run_process(&spec("echo out; echo err >&2", OutputMode::Buffer))
            .await
            .unwrap();
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_non_zero_exit_keeps_output() {
        let err = run_process(&spec("echo broken >&2; exit 3", OutputMode::Buffer))
            .await
            .unwrap_err();
        match err {
            ExecError::Failed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, 3);
                assert_eq!(stderr, "broken\n");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_sigkill_is_out_of_memory() {
        let err = run_process(&spec("kill -9 $$", OutputMode::Buffer))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::OutOfMemory { .. }));
        assert_eq!(err.exit_code(), 137);
    }

    #[tokio::test]
    async fn test_other_signal() {
        let err = run_process(&spec("kill -15 $$", OutputMode::Buffer))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Signal { signal: 15, .. }));
    }

    #[tokio::test]
    async fn test_buffer_limit() {
        let mut spec = spec(
            "i=0; while [ $i -lt 200 ]; do echo line-$i; i=$((i+1)); done",
            OutputMode::Buffer,
        );
        spec.max_buffer = 64;
        let err = run_process(&spec).await.unwrap_err();
        assert!(matches!(err, ExecError::BufferExceeded { limit: 64, .. }));
        assert!(!err.is_echoable());
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let mut spec = spec("", OutputMode::Buffer);
        spec.bin = "toolrig-definitely-missing-binary".into();
        let err = run_process(&spec).await.unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_stream_mode_does_not_capture() {
        let output = run_process(&spec("echo streamed", OutputMode::Stream))
            .await
            .unwrap();
        assert!(output.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_utf8_output_is_kept_and_drained() {
        let mut spec = spec(
            "printf 'caf\\351\\n'; i=0; while [ $i -lt 20000 ]; do echo line-$i; i=$((i+1)); done; echo done",
            OutputMode::Buffer,
        );
        spec.max_buffer = 1024 * 1024;
        let output = run_process(&spec).await.unwrap();

        assert!(output.stdout.starts_with("caf\u{FFFD}\n"));
        assert!(output.stdout.contains("line-19999\n"));
        assert!(output.stdout.ends_with("done\n"));
    }

    #[test]
    fn test_decode_line_strips_terminators() {
        assert_eq!(decode_line(b"plain\n"), "plain");
        assert_eq!(decode_line(b"windows\r\n"), "windows");
        assert_eq!(decode_line(b"no newline"), "no newline");
        assert_eq!(decode_line(b"bad \xff byte\n"), "bad \u{FFFD} byte");
    }

    #[tokio::test]
    async fn test_watch_mode_runs_to_completion() {
        let output = run_process(&spec(
            "echo first; sleep 1; echo second >&2; echo third",
            OutputMode::Watch,
        ))
        .await
        .unwrap();
        assert_eq!(output.exit_code, 0);
        assert!(output.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_watch_mode_keeps_exit_code() {
        let err = run_process(&spec("echo watching; exit 4", OutputMode::Watch))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Failed { exit_code: 4, .. }));
    }

    #[tokio::test]
    async fn test_capture_help_uses_driver_env() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("help.sh");
        std::fs::write(&script, "echo \"usage: tool --$TOOL_FLAG\" >&2\n").unwrap();

        let mut ctx = ExecutionContext::new(dir.path(), crate::context::ExecutionArgs::default());
        ctx.env.set("TOOL_FLAG", "from-context");
        let driver_env = HashMap::from([("TOOL_FLAG".to_string(), "from-driver".to_string())]);

        let help = capture_help("sh", &script.display().to_string(), &ctx, &driver_env)
            .await
            .unwrap();
        assert_eq!(help.trim(), "usage: tool --from-driver");
    }

    #[test]
    fn test_command_line_quotes() {
        let spec = spec("echo 'a b'", OutputMode::Buffer);
        let line = spec.command_line();
        assert_eq!(
            shlex::split(&line).unwrap(),
            vec!["sh", "-c", "echo 'a b'"]
        );
    }
}
