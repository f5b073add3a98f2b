//! Console output for wrapped tools.
//!
//! Tool output goes straight to the process's stdout/stderr handles, never
//! through tracing. Write failures (closed pipes) are ignored.

use std::io::Write;

/// Write `text` to stdout, adding a trailing newline if missing.
pub fn write_stdout(text: &str) {
    if text.trim().is_empty() {
        return;
    }
    let mut out = std::io::stdout().lock();
    let _ = write_terminated(&mut out, text);
}

/// Write `text` to stderr, adding a trailing newline if missing.
pub fn write_stderr(text: &str) {
    if text.trim().is_empty() {
        return;
    }
    let mut err = std::io::stderr().lock();
    let _ = write_terminated(&mut err, text);
}

/// Write one line to stdout or stderr, with an optional `[prefix]`.
pub fn write_line(prefix: Option<&str>, line: &str, to_stderr: bool) {
    let text = match prefix {
        Some(prefix) => format!("[{prefix}] {line}\n"),
        None => format!("{line}\n"),
    };
    if to_stderr {
        let _ = std::io::stderr().lock().write_all(text.as_bytes());
    } else {
        let _ = std::io::stdout().lock().write_all(text.as_bytes());
    }
}

fn write_terminated(writer: &mut impl Write, text: &str) -> std::io::Result<()> {
    writer.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        writer.write_all(b"\n")?;
    }
    writer.flush()
}
