//! Encoder invocation
//!
//! Runs ffmpeg once per job under a hard timeout and classifies the result.
//! There is no retry: each file gets exactly one attempt.

use crate::config::StealthConfig;
use crate::encode_job::EncodeJob;
use shared_utils::ffmpeg_process::{format_ffmpeg_error, run_with_timeout, stderr_tail, ProcessRun};
use shared_utils::logging::log_external_tool;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Characters of encoder stderr kept in a failure message.
pub const STDERR_TAIL_CHARS: usize = 200;

/// Why a file did not produce an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    EncodeFailed,
    EncodeTimeout,
    MissingOutput,
    /// The encoder binary could not be started
    LaunchFailed,
    /// Parameters could not be drawn for the file
    JobSetup,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::EncodeFailed => "EncodeFailed",
            FailureKind::EncodeTimeout => "EncodeTimeout",
            FailureKind::MissingOutput => "MissingOutput",
            FailureKind::LaunchFailed => "LaunchFailed",
            FailureKind::JobSetup => "JobSetup",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("ffmpeg exited with code {exit_code:?}: {stderr_tail}")]
    Failed {
        exit_code: Option<i32>,
        stderr_tail: String,
        elapsed: Duration,
    },

    #[error("ffmpeg timed out after {}s", timeout.as_secs())]
    Timeout { timeout: Duration },

    #[error("ffmpeg reported success but {} was not created", path.display())]
    MissingOutput { path: PathBuf, elapsed: Duration },

    #[error("Failed to launch ffmpeg: {0}")]
    Launch(String),
}

impl EncodeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            EncodeError::Failed { .. } => FailureKind::EncodeFailed,
            EncodeError::Timeout { .. } => FailureKind::EncodeTimeout,
            EncodeError::MissingOutput { .. } => FailureKind::MissingOutput,
            EncodeError::Launch(_) => FailureKind::LaunchFailed,
        }
    }

    /// Time charged to the attempt. A timeout always reports the configured
    /// limit, not the measured wall time.
    pub fn elapsed(&self) -> Duration {
        match self {
            EncodeError::Failed { elapsed, .. } | EncodeError::MissingOutput { elapsed, .. } => {
                *elapsed
            }
            EncodeError::Timeout { timeout } => *timeout,
            EncodeError::Launch(_) => Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSuccess {
    pub output: PathBuf,
    pub elapsed: Duration,
    pub input_size: u64,
    pub output_size: u64,
}

impl EncodeSuccess {
    /// Output size as a fraction of input size.
    pub fn size_ratio(&self) -> Option<f64> {
        (self.input_size > 0).then(|| self.output_size as f64 / self.input_size as f64)
    }
}

pub struct EncodeInvoker {
    ffmpeg: PathBuf,
    timeout: Duration,
}

impl EncodeInvoker {
    pub fn new(ffmpeg: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            timeout,
        }
    }

    pub fn from_config(config: &StealthConfig) -> Self {
        Self::new(config.tools.ffmpeg.clone(), config.tools.encode_timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn run(&self, job: &EncodeJob) -> Result<EncodeSuccess, EncodeError> {
        let args = job.to_args();
        let tool = self.ffmpeg.display().to_string();

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(&args);

        let run = run_with_timeout(&mut cmd, self.timeout)
            .map_err(|e| EncodeError::Launch(format!("{:#}", e)))?;

        let completed = match run {
            ProcessRun::TimedOut { elapsed } => {
                log_external_tool(&tool, &args, "", None, elapsed);
                return Err(EncodeError::Timeout {
                    timeout: self.timeout,
                });
            }
            ProcessRun::Completed(completed) => completed,
        };

        log_external_tool(
            &tool,
            &args,
            &completed.stderr,
            completed.status.code(),
            completed.elapsed,
        );

        if !completed.success() {
            warn!(
                input = %job.input.display(),
                error = %format_ffmpeg_error(&completed.stderr),
                "ffmpeg exited with failure"
            );
            return Err(EncodeError::Failed {
                exit_code: completed.status.code(),
                stderr_tail: stderr_tail(&completed.stderr, STDERR_TAIL_CHARS)
                    .trim()
                    .to_string(),
                elapsed: completed.elapsed,
            });
        }

        let output_size = match fs::metadata(&job.output) {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                return Err(EncodeError::MissingOutput {
                    path: job.output.clone(),
                    elapsed: completed.elapsed,
                })
            }
        };
        let input_size = file_size(&job.input);
        debug!(
            input_size,
            output_size,
            elapsed_secs = completed.elapsed.as_secs_f64(),
            "Encode finished"
        );

        Ok(EncodeSuccess {
            output: job.output.clone(),
            elapsed: completed.elapsed,
            input_size,
            output_size,
        })
    }
}

fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::filter_graph::FilterChain;
    use crate::sampler::SampledParameters;
    use crate::test_support::{write_script, writes_last_arg};
    use chrono::Utc;
    use tempfile::TempDir;

    fn job_in(dir: &TempDir) -> EncodeJob {
        let input = dir.path().join("clip.mp4");
        fs::write(&input, vec![0u8; 1000]).unwrap();
        let config = StealthConfig {
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let params = SampledParameters {
            framerate: 30,
            video_bitrate_k: 3000,
            audio_bitrate_k: 128,
            ..Default::default()
        };
        EncodeJob::build(
            &config,
            &input,
            30.0,
            &params,
            FilterChain::build(&params),
            Utc::now(),
        )
    }

    #[test]
    fn test_success_reports_sizes() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = write_script(dir.path(), "ffmpeg", &writes_last_arg("0123456789"));
        let job = job_in(&dir);

        let ok = EncodeInvoker::new(ffmpeg, Duration::from_secs(10))
            .run(&job)
            .unwrap();
        assert_eq!(ok.output, job.output);
        assert_eq!(ok.input_size, 1000);
        assert_eq!(ok.output_size, 10);
        assert!((ok.size_ratio().unwrap() - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_nonzero_exit_is_encode_failed() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = write_script(
            dir.path(),
            "ffmpeg",
            "echo 'Error opening input file' >&2\nexit 1",
        );
        let err = EncodeInvoker::new(ffmpeg, Duration::from_secs(10))
            .run(&job_in(&dir))
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::EncodeFailed);
        match err {
            EncodeError::Failed {
                exit_code,
                stderr_tail,
                ..
            } => {
                assert_eq!(exit_code, Some(1));
                assert_eq!(stderr_tail, "Error opening input file");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_zero_exit_without_output_is_missing_output() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = write_script(dir.path(), "ffmpeg", "exit 0");
        let err = EncodeInvoker::new(ffmpeg, Duration::from_secs(10))
            .run(&job_in(&dir))
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::MissingOutput);
    }

    #[test]
    fn test_timeout_reports_configured_elapsed() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = write_script(dir.path(), "ffmpeg", "exec sleep 5");
        let timeout = Duration::from_millis(300);
        let err = EncodeInvoker::new(ffmpeg, timeout)
            .run(&job_in(&dir))
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::EncodeTimeout);
        assert_eq!(err.elapsed(), timeout);
    }

    #[test]
    fn test_missing_binary_is_launch_failure() {
        let dir = TempDir::new().unwrap();
        let err = EncodeInvoker::new(dir.path().join("no-such-ffmpeg"), Duration::from_secs(1))
            .run(&job_in(&dir))
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::LaunchFailed);
        assert_eq!(err.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_long_stderr_is_truncated() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = write_script(
            dir.path(),
            "ffmpeg",
            "i=0; while [ $i -lt 50 ]; do echo 'frame=  12 fps=0.0 q=0.0' >&2; i=$((i+1)); done\nexit 2",
        );
        let err = EncodeInvoker::new(ffmpeg, Duration::from_secs(10))
            .run(&job_in(&dir))
            .unwrap_err();
        match err {
            EncodeError::Failed { stderr_tail, .. } => {
                assert!(stderr_tail.chars().count() <= STDERR_TAIL_CHARS)
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
