//! Bounded external-process execution.
//!
//! Every call spawns exactly one child from a discrete argument vector (no
//! shell parsing) and always produces a `String`. stdout and stderr share a
//! single pipe, so the text keeps the order the child wrote it in. Non-zero exits, timeouts
//! and launch failures are all folded into the returned text; nothing here
//! returns an error to the caller.

use crate::config::ExecutorConfig;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

/// Reference per-call timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Maximum captured output (1MB).
pub const MAX_OUTPUT_BYTES: usize = 1_048_576;
/// Prefix for every launch-failure result.
pub const LAUNCH_ERROR_PREFIX: &str = "Error executing command: ";

/// Runs argument vectors as child processes under a hard timeout.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    timeout: Duration,
    max_output_bytes: usize,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

impl ProcessExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            max_output_bytes: MAX_OUTPUT_BYTES,
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            max_output_bytes: config.max_output_bytes.max(1),
        }
    }

    pub fn with_max_output_bytes(mut self, max_output_bytes: usize) -> Self {
        self.max_output_bytes = max_output_bytes.max(1);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `argv` and return its merged stdout/stderr as text.
    ///
    /// * exit 0 or non-zero: captured output, invalid UTF-8 replaced
    /// * timeout: `"Command timed out after <n> seconds"`, child group killed
    /// * launch failure: `"Error executing command: <detail>"`
    pub async fn run(&self, argv: &[String]) -> String {
        let Some((program, args)) = argv.split_first() else {
            return format!("{LAUNCH_ERROR_PREFIX}empty argument vector");
        };

        let (reader, writer) = match merged_pipe() {
            Ok(pipe) => pipe,
            Err(e) => {
                tracing::warn!(program = %program, "Failed to create output pipe: {e}");
                return format!("{LAUNCH_ERROR_PREFIX}{e}");
            }
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(writer.0)
            .stderr(writer.1)
            .kill_on_drop(true);
        isolate_process_group(&mut cmd);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(program = %program, "Failed to launch process: {e}");
                return format!("{LAUNCH_ERROR_PREFIX}{e}");
            }
        };
        // Release the parent's write ends so EOF arrives when the child exits.
        drop(cmd);

        let limit = self.max_output_bytes;

        let outcome = tokio::time::timeout(self.timeout, async {
            tokio::join!(read_merged(reader, limit), child.wait())
        })
        .await;

        match outcome {
            Ok((output, status)) => {
                let status = match status {
                    Ok(status) => status,
                    Err(e) => {
                        tracing::warn!(program = %program, "Failed to wait for process: {e}");
                        return format!("{LAUNCH_ERROR_PREFIX}{e}");
                    }
                };
                if !status.success() {
                    tracing::debug!(program = %program, status = %status, "Process exited unsuccessfully");
                }
                render_output(output, limit)
            }
            Err(_) => {
                terminate(&mut child).await;
                tracing::warn!(
                    program = %program,
                    timeout_secs = self.timeout.as_secs(),
                    "Process timed out and was killed"
                );
                format!(
                    "Command timed out after {} seconds",
                    format_secs(self.timeout)
                )
            }
        }
    }
}

/// One-shot helper: run `argv` under `timeout` with the default output cap.
pub async fn run(argv: &[String], timeout: Duration) -> String {
    ProcessExecutor::new(timeout).run(argv).await
}

/// Captured bytes, plus whether anything was dropped.
#[derive(Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

/// One pipe, with two write ends for the child's stdout and stderr.
fn merged_pipe() -> std::io::Result<(std::io::PipeReader, (Stdio, Stdio))> {
    let (reader, writer) = std::io::pipe()?;
    let stdout = writer.try_clone()?;
    Ok((reader, (Stdio::from(stdout), Stdio::from(writer))))
}

#[cfg(unix)]
async fn read_merged(reader: std::io::PipeReader, limit: usize) -> Captured {
    use std::os::fd::OwnedFd;
    use tokio::net::unix::pipe::Receiver;

    match Receiver::from_owned_fd(OwnedFd::from(reader)) {
        Ok(receiver) => read_capped(receiver, limit).await,
        Err(e) => {
            tracing::debug!("Process pipe setup error: {e}");
            Captured::default()
        }
    }
}

#[cfg(not(unix))]
async fn read_merged(reader: std::io::PipeReader, limit: usize) -> Captured {
    tokio::task::spawn_blocking(move || read_capped_blocking(reader, limit))
        .await
        .unwrap_or_default()
}

/// Read a pipe to EOF, keeping at most `limit` bytes.
///
/// The stream is drained past the limit so the child never blocks on a full
/// pipe.
async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> Captured {
    let mut captured = Captured::default();
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => captured.push(&buf[..n], limit),
            Err(e) => {
                tracing::debug!("Process pipe read error: {e}");
                break;
            }
        }
    }
    captured
}

#[cfg(not(unix))]
fn read_capped_blocking<R: std::io::Read>(mut reader: R, limit: usize) -> Captured {
    let mut captured = Captured::default();
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => captured.push(&buf[..n], limit),
            Err(e) => {
                tracing::debug!("Process pipe read error: {e}");
                break;
            }
        }
    }
    captured
}

impl Captured {
    fn push(&mut self, chunk: &[u8], limit: usize) {
        let room = limit.saturating_sub(self.bytes.len());
        if chunk.len() > room {
            self.truncated = true;
        }
        self.bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }
}

/// Captured output decoded lossily, with a note when it was cut.
fn render_output(output: Captured, limit: usize) -> String {
    let mut text = String::from_utf8_lossy(&output.bytes).into_owned();
    if output.truncated {
        text.push_str(&format!("\n... [output truncated at {limit} bytes]"));
    }
    text
}

fn format_secs(timeout: Duration) -> String {
    if timeout.subsec_nanos() == 0 {
        timeout.as_secs().to_string()
    } else {
        format!("{:.1}", timeout.as_secs_f64())
    }
}

#[cfg(unix)]
fn isolate_process_group(cmd: &mut Command) {
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn isolate_process_group(_cmd: &mut Command) {}

#[cfg(unix)]
fn kill_process_group(child: &Child) {
    if let Some(pgid) = child.id().and_then(|pid| i32::try_from(pid).ok()) {
        // SAFETY: kill(2) takes plain integers; the group was created by
        // `isolate_process_group` for this child alone.
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

/// Kill the child and everything it spawned, then reap it.
async fn terminate(child: &mut Child) {
    kill_process_group(child);
    if let Err(e) = child.kill().await {
        tracing::debug!("Failed to kill timed-out process: {e}");
    }
}
