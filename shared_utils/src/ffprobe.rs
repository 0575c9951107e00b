//! FFprobe wrapper module
//!
//! Bounded ffprobe calls used before and after an encode: the duration probe
//! and the key=value format/stream dump read by the verification step.

use crate::ffmpeg_process::{run_with_timeout, ProcessRun};
use std::path::Path;
use std::process::Command;
use std::time::Duration;

#[derive(Debug)]
pub enum FFprobeError {
    ExecutionFailed(String),
    ParseError(String),
    Timeout(Duration),
}

impl std::fmt::Display for FFprobeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FFprobeError::ExecutionFailed(s) => write!(f, "FFprobe failed: {}", s),
            FFprobeError::ParseError(s) => write!(f, "Parse error: {}", s),
            FFprobeError::Timeout(t) => write!(f, "FFprobe timed out after {:.0}s", t.as_secs_f64()),
        }
    }
}

impl std::error::Error for FFprobeError {}

fn run_ffprobe(ffprobe: &Path, args: &[&str], input: &Path, timeout: Duration) -> Result<String, FFprobeError> {
    let mut cmd = Command::new(ffprobe);
    cmd.args(args).arg("--").arg(input);

    let run = run_with_timeout(&mut cmd, timeout)
        .map_err(|e| FFprobeError::ExecutionFailed(format!("{:#}", e)))?;

    match run {
        ProcessRun::TimedOut { .. } => Err(FFprobeError::Timeout(timeout)),
        ProcessRun::Completed(run) if run.success() => Ok(run.stdout),
        ProcessRun::Completed(run) => {
            let stderr = run.stderr.trim();
            let msg = if stderr.is_empty() {
                format!(
                    "ffprobe failed to analyze file: {} (exit code: {:?})",
                    input.display(),
                    run.status.code()
                )
            } else {
                format!("ffprobe error for '{}': {}", input.display(), stderr)
            };
            Err(FFprobeError::ExecutionFailed(msg))
        }
    }
}

/// Container duration in seconds.
///
/// Fails on any non-zero exit, timeout, or output that is not a positive
/// finite number (ffprobe prints `N/A` for streams without a duration).
pub fn get_duration(ffprobe: &Path, input: &Path, timeout: Duration) -> Result<f64, FFprobeError> {
    let stdout = run_ffprobe(
        ffprobe,
        &[
            "-v",
            "quiet",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ],
        input,
        timeout,
    )?;
    parse_duration(&stdout)
}

pub fn parse_duration(stdout: &str) -> Result<f64, FFprobeError> {
    let text = stdout.trim();
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(FFprobeError::ParseError(format!(
            "unusable duration value: {:?}",
            text
        ))),
    }
}

/// Raw `-show_format -show_streams` dump in ffprobe's default writer format.
pub fn show_format_and_streams(ffprobe: &Path, input: &Path, timeout: Duration) -> Result<String, FFprobeError> {
    run_ffprobe(ffprobe, &["-v", "quiet", "-show_format", "-show_streams"], input, timeout)
}

/// Splits ffprobe default-writer output into `(key, value)` pairs.
///
/// Keys are trimmed and lowercased, values trimmed. Lines without `=`
/// (section markers such as `[STREAM]`) are skipped; only the first `=`
/// separates key from value.
pub fn parse_key_values(output: &str) -> impl Iterator<Item = (String, String)> + '_ {
    output.lines().filter_map(|line| {
        let (key, value) = line.split_once('=')?;
        Some((key.trim().to_lowercase(), value.trim().to_string()))
    })
}
