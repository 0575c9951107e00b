//! FFmpeg process management - bounded, deadlock-free child execution
//!
//! ## Background
//!
//! Piping stdout and stderr but only draining one of them deadlocks once the
//! other fills the OS pipe buffer (typically 64KB): the tool blocks on its
//! write, we block on its exit. FFmpeg writes a lot of stderr.
//!
//! Both pipes are therefore drained on dedicated threads while the caller
//! waits on the child with a hard timeout.
//!
//! ## Usage
//!
//! ```ignore
//! use shared_utils::ffmpeg_process::{run_with_timeout, ProcessRun};
//! use std::process::Command;
//! use std::time::Duration;
//!
//! let mut cmd = Command::new("ffmpeg");
//! cmd.arg("-i").arg("input.mp4").arg("output.mov");
//!
//! match run_with_timeout(&mut cmd, Duration::from_secs(180))? {
//!     ProcessRun::Completed(run) => println!("exit: {:?}", run.status.code()),
//!     ProcessRun::TimedOut { elapsed } => println!("killed after {:?}", elapsed),
//! }
//! ```

use anyhow::{Context, Result};
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

// ═══════════════════════════════════════════════════════════════
// FfmpegProcess - child wrapper that drains both pipes
// ═══════════════════════════════════════════════════════════════

/// Child process whose stdout and stderr are consumed on background threads.
pub struct FfmpegProcess {
    child: Child,
    started: Instant,
    stdout_thread: Option<JoinHandle<String>>,
    stderr_thread: Option<JoinHandle<String>>,
}

/// Output of a process that exited on its own.
#[derive(Debug, Clone)]
pub struct CompletedRun {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl CompletedRun {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// How a bounded run ended.
#[derive(Debug, Clone)]
pub enum ProcessRun {
    Completed(CompletedRun),
    /// The timeout elapsed; the child was killed and reaped.
    TimedOut { elapsed: Duration },
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

impl FfmpegProcess {
    /// Spawns `cmd` with stdin closed and both output pipes captured.
    ///
    /// # Errors
    /// - the program could not be started (missing binary, permissions)
    pub fn spawn(cmd: &mut Command) -> Result<Self> {
        let command_str = format!("{:?}", cmd);
        info!(command = %command_str, "Executing external command");

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn process: {}", command_str))?;
        let started = Instant::now();

        let stdout_thread = child.stdout.take().map(drain);
        let stderr_thread = child.stderr.take().map(drain);

        Ok(Self {
            child,
            started,
            stdout_thread,
            stderr_thread,
        })
    }

    /// Waits for exit, killing the child once `timeout` has passed.
    ///
    /// On timeout the reader threads are detached rather than joined: a
    /// grandchild may still hold the pipes open.
    pub fn wait_with_timeout(mut self, timeout: Duration) -> Result<ProcessRun> {
        let waited = self
            .child
            .wait_timeout(timeout)
            .context("Failed to wait for child process")?;

        match waited {
            Some(status) => {
                let elapsed = self.started.elapsed();
                let stdout = join_output(self.stdout_thread.take());
                let stderr = join_output(self.stderr_thread.take());
                debug!(
                    exit_code = status.code(),
                    elapsed_secs = elapsed.as_secs_f64(),
                    stderr_len = stderr.len(),
                    "Child process exited"
                );
                Ok(ProcessRun::Completed(CompletedRun {
                    status,
                    stdout,
                    stderr,
                    elapsed,
                }))
            }
            None => {
                if let Err(e) = self.child.kill() {
                    warn!(error = %e, "Failed to kill timed-out process");
                }
                let _ = self.child.wait();
                let elapsed = self.started.elapsed();
                warn!(
                    timeout_secs = timeout.as_secs_f64(),
                    "Child process timed out and was killed"
                );
                Ok(ProcessRun::TimedOut { elapsed })
            }
        }
    }
}

fn join_output(handle: Option<JoinHandle<String>>) -> String {
    handle
        .map(|t| t.join().unwrap_or_default())
        .unwrap_or_default()
}

/// Spawns `cmd` and waits at most `timeout` for it.
pub fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<ProcessRun> {
    FfmpegProcess::spawn(cmd)?.wait_with_timeout(timeout)
}

// ═══════════════════════════════════════════════════════════════
// FFmpeg error formatting
// ═══════════════════════════════════════════════════════════════

/// Extracts the most meaningful single line from FFmpeg stderr.
///
/// 1. the last line mentioning "Error"/"error"
/// 2. otherwise the last non-empty line that is not a progress line
/// 3. otherwise "Unknown FFmpeg error"
pub fn format_ffmpeg_error(stderr: &str) -> String {
    if let Some(error_line) = stderr
        .lines()
        .rev()
        .find(|line| line.contains("Error") || line.contains("error"))
    {
        return error_line.trim().to_string();
    }

    stderr
        .lines()
        .rev()
        .find(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty()
                && !trimmed.starts_with("frame=")
                && !trimmed.starts_with("fps=")
                && !trimmed.starts_with("size=")
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "Unknown FFmpeg error".to_string())
}

/// The last `max_chars` characters of `stderr`, cut on a char boundary.
pub fn stderr_tail(stderr: &str, max_chars: usize) -> &str {
    let count = stderr.chars().count();
    if count <= max_chars {
        return stderr;
    }
    let skip = count - max_chars;
    match stderr.char_indices().nth(skip) {
        Some((idx, _)) => &stderr[idx..],
        None => "",
    }
}
