//! Shared Utilities for the vid_stealth tools
//!
//! Common plumbing that is not specific to the transformation pipeline:
//! - Bounded external process execution (FFmpeg / FFprobe)
//! - FFprobe duration and key=value dumps
//! - Logging (append-only log file + stderr)
//! - Input discovery and batch accounting
//! - Summary reporting

pub mod batch;
pub mod common_utils;
pub mod ffmpeg_process;
pub mod ffprobe;
pub mod logging;
pub mod report;

pub use batch::{collect_files, BatchResult, VIDEO_EXTENSIONS};
pub use ffmpeg_process::{
    format_ffmpeg_error, run_with_timeout, stderr_tail, CompletedRun, FfmpegProcess, ProcessRun,
};
pub use ffprobe::{get_duration, parse_key_values, show_format_and_streams, FFprobeError};
pub use report::{format_bytes, format_duration, print_summary_report};
