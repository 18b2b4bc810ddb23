use std::ffi::OsStr;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use wait_timeout::ChildExt;

use crate::error::{Error, Result};

/// Captured result of one external tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// The tool's own error text: stderr when present, otherwise stdout.
    pub fn message(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Short tool name used in error messages (`/usr/bin/systemctl` -> `systemctl`).
pub(crate) fn tool_name(program: &OsStr) -> String {
    Path::new(program)
        .file_name()
        .unwrap_or(program)
        .to_string_lossy()
        .into_owned()
}

fn command_line<S: AsRef<OsStr>>(program: &OsStr, args: &[S]) -> String {
    let mut line = program.to_string_lossy().into_owned();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.as_ref().to_string_lossy());
    }
    line
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        // A read error just truncates the captured text.
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// Execute a tool, capturing stdout and stderr.
///
/// A missing binary maps to [`Error::ExternalToolMissing`]. With a timeout the
/// child is killed and reaped once the limit passes, and the call returns
/// [`Error::ExternalToolTimeout`]. A non-zero exit is *not* an error here;
/// callers decide how to classify it.
pub fn run_tool<S: AsRef<OsStr>>(
    program: impl AsRef<OsStr>,
    args: &[S],
    timeout: Option<Duration>,
) -> Result<ToolOutput> {
    let program = program.as_ref();
    let tool = tool_name(program);
    let cmd_line = command_line(program, args);
    tracing::debug!("exec (capture): {cmd_line}");

    let spawned = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::ExternalToolMissing { tool });
        }
        Err(e) => return Err(Error::fs(format!("failed to execute: {cmd_line}"), e)),
    };

    // Drain both pipes while waiting so a chatty tool cannot block on a full
    // pipe buffer.
    let stdout = child.stdout.take().map(spawn_reader);
    let stderr = child.stderr.take().map(spawn_reader);

    let status = match timeout {
        Some(limit) => match child.wait_timeout(limit) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                // Reader threads are detached: a grandchild may still hold
                // the pipes open.
                tracing::warn!("command timed out after {limit:?}: {cmd_line}");
                return Err(Error::ExternalToolTimeout {
                    tool,
                    timeout: limit,
                });
            }
            Err(e) => return Err(Error::fs(format!("failed to wait for: {cmd_line}"), e)),
        },
        None => child
            .wait()
            .map_err(|e| Error::fs(format!("failed to wait for: {cmd_line}"), e))?,
    };

    let output = ToolOutput {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    };
    if !output.success() {
        tracing::debug!("command failed: {cmd_line} ({})\n{}", output.status, output.message());
    }
    Ok(output)
}

/// Execute a tool attached to the current terminal (for flows that need the
/// user, such as a browser login). No timeout is applied.
pub fn run_interactive<S: AsRef<OsStr>>(program: impl AsRef<OsStr>, args: &[S]) -> Result<ExitStatus> {
    let program = program.as_ref();
    let cmd_line = command_line(program, args);
    tracing::debug!("exec (interactive): {cmd_line}");

    match Command::new(program).args(args).status() {
        Ok(status) => Ok(status),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::ExternalToolMissing {
            tool: tool_name(program),
        }),
        Err(e) => Err(Error::fs(format!("failed to execute: {cmd_line}"), e)),
    }
}
