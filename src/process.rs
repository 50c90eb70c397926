//! Subprocess execution with line-by-line output streaming.
//!
//! Every external tool — the generative agent, git, gh — is driven as a
//! subprocess rooted in a ticket workspace. Two modes:
//! - [`stream_command`]: combined stdout/stderr as a lazy sequence of
//!   sanitized lines, so callers can forward progress while accumulating
//!   it for parsing.
//! - [`run_captured`]: buffered combined output for short housekeeping
//!   invocations (session bootstrap, listing, VCS subcommands).
//!
//! Streamed lines pass through a sanitizer that strips the agent
//! transport's `data:` line framing and drops keep-alive lines and the
//! `__END__` sentinel, so framing never leaks into content that is later
//! written verbatim to plan artifacts, staged files, or diffs.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::Result;

/// Transport line-prefix marker used by the agent's streaming output.
pub const DATA_PREFIX: &str = "data:";

/// End-of-stream sentinel emitted by the agent transport.
pub const END_SENTINEL: &str = "__END__";

/// Channel on which pipeline stages forward progress lines to the caller.
pub type OutputSink = mpsc::UnboundedSender<String>;

/// Forward a line to the caller, ignoring a hung-up receiver.
pub fn emit(out: &OutputSink, line: impl Into<String>) {
    let _ = out.send(line.into());
}

/// Sanitize one raw output line.
///
/// A line that, after trimming, carries the transport prefix has the
/// prefix and surrounding whitespace stripped. Lines that are then empty
/// or equal the end-of-stream sentinel are dropped entirely. Unframed
/// lines keep their leading whitespace: they may be file content.
pub fn sanitize_line(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let line = match trimmed.strip_prefix(DATA_PREFIX) {
        Some(rest) => rest.trim(),
        None => raw.trim_end(),
    };
    if line.trim().is_empty() || line.trim() == END_SENTINEL {
        return None;
    }
    Some(line.to_string())
}

/// A single-pass, finite sequence of sanitized output lines from a child
/// process.
///
/// The sequence ends when the process closes both output pipes; the exit
/// status is observed separately through [`LineStream::wait`].
pub struct LineStream {
    rx: mpsc::UnboundedReceiver<String>,
    child: Child,
}

impl LineStream {
    /// Next sanitized line, or `None` once the process closes its output.
    pub async fn next_line(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Wait for process exit. Call after draining the stream.
    pub async fn wait(mut self) -> Result<ExitStatus> {
        Ok(self.child.wait().await?)
    }
}

/// Spawn `program args..` in `cwd` and return its combined stdout/stderr
/// as a lazy stream of sanitized lines.
pub fn stream_command(program: &str, args: &[&str], cwd: &Path) -> Result<LineStream> {
    debug!("spawning {} {:?} in {}", program, args, cwd.display());

    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let (tx, rx) = mpsc::unbounded_channel();

    if let Some(stdout) = child.stdout.take() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(clean) = sanitize_line(&line) {
                    if tx.send(clean).is_err() {
                        break;
                    }
                }
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(clean) = sanitize_line(&line) {
                    if tx.send(clean).is_err() {
                        break;
                    }
                }
            }
        });
    }

    Ok(LineStream { rx, child })
}

/// Buffered output of a subprocess run to completion.
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    /// Stdout and stderr concatenated, for callers that scan both channels.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Run `program args..` in `cwd` to completion, capturing both channels.
pub async fn run_captured(program: &str, args: &[&str], cwd: &Path) -> Result<CapturedOutput> {
    debug!("running {} {:?} in {}", program, args, cwd.display());

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output()
        .await?;

    Ok(CapturedOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
