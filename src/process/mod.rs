//! Subprocess invocation for the external tools (yt-dlp, ffmpeg).
//!
//! Both output streams are drained while the child runs, otherwise a chatty tool can
//! fill its pipe and stall forever. Output is decoded lossily: it is only logged.
//!
//! On unix each tool gets its own process group. If the returned future is dropped
//! before the tool exits (e.g. on a stage timeout) the whole group is killed, which
//! also takes down helpers the tool spawned itself, like the ffmpeg run by yt-dlp.

use anyhow::{Context, Result};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// Program plus the arguments that always precede the generated ones
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub program: String,
    pub base_args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
        }
    }

    pub fn with_args(program: impl Into<String>, base_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
        }
    }
}

/// Collected output of a finished process
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Last few stderr lines, for error messages
    pub fn stderr_tail(&self, count: usize) -> String {
        let start = self.stderr.len().saturating_sub(count);
        self.stderr[start..].join(" | ")
    }
}

/// Run a tool to completion, logging every output line under `label`
pub async fn run_logged(tool: &ToolCommand, args: &[String], label: &str) -> Result<ProcessOutput> {
    let command_line: Vec<&str> = std::iter::once(tool.program.as_str())
        .chain(tool.base_args.iter().map(String::as_str))
        .chain(args.iter().map(String::as_str))
        .collect();
    tracing::info!("Running process: [{}]", command_line.join(" "));

    let mut command = Command::new(&tool.program);
    command
        .args(&tool.base_args)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to start {}", tool.program))?;
    let mut group = ProcessGroup::new(child.id());

    let stdout = child.stdout.take().context("Failed to capture stdout")?;
    let stderr = child.stderr.take().context("Failed to capture stderr")?;

    let (stdout, stderr) = tokio::join!(
        drain_lines(stdout, label, false),
        drain_lines(stderr, label, true),
    );

    let status = child
        .wait()
        .await
        .with_context(|| format!("Failed to wait for {}", tool.program))?;
    group.disarm();

    tracing::debug!("{} exited with {}", tool.program, status);

    Ok(ProcessOutput { status, stdout, stderr })
}

/// Kills the tool's process group when dropped before the tool was reaped
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.take() {
            tracing::debug!("Killing process group {}", pgid);
            // SAFETY: killpg only takes plain integers; the group was created at spawn
            let ret = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
            if ret != 0 {
                tracing::debug!(
                    "killpg({}) failed: {}",
                    pgid,
                    std::io::Error::last_os_error()
                );
            }
        }
    }
}

async fn drain_lines<R>(stream: R, label: &str, is_stderr: bool) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut collected = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                let line = String::from_utf8_lossy(&buf).into_owned();
                if is_stderr {
                    tracing::info!("{} (stderr): {}", label, line);
                } else {
                    tracing::info!("{}: {}", label, line);
                }
                collected.push(line);
            }
            Err(e) => {
                tracing::warn!("Stopped reading {} output: {}", label, e);
                break;
            }
        }
    }

    collected
}

/// Check if a command is available in PATH
pub async fn command_available(command: &str) -> bool {
    Command::new(command)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}
