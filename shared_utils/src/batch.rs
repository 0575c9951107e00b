//! Batch Processing Module
//!
//! Input discovery and per-batch accounting for sequential file processing.

use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// Container extensions accepted as video input.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v", "flv"];

/// Files under `dir` whose extension is in `extensions`, sorted by path.
pub fn collect_files(dir: &Path, extensions: &[&str], recursive: bool) -> Vec<PathBuf> {
    let walker = if recursive {
        WalkDir::new(dir).follow_links(true)
    } else {
        WalkDir::new(dir).max_depth(1)
    };

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| crate::common_utils::has_extension(e.path(), extensions))
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<(PathBuf, String)>,
    /// Sum of per-file elapsed times as reported by each attempt
    pub elapsed: Duration,
}

impl BatchResult {
    pub fn new() -> Self {
        Self {
            total: 0,
            succeeded: 0,
            failed: 0,
            errors: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn success(&mut self, elapsed: Duration) {
        self.total += 1;
        self.succeeded += 1;
        self.elapsed += elapsed;
    }

    pub fn fail(&mut self, path: PathBuf, error: String, elapsed: Duration) {
        self.total += 1;
        self.failed += 1;
        self.elapsed += elapsed;
        self.errors.push((path, error));
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.succeeded as f64 / self.total as f64) * 100.0
        }
    }

    /// Mean elapsed time per attempted file; `None` for an empty batch.
    pub fn average_elapsed(&self) -> Option<Duration> {
        if self.total == 0 {
            None
        } else {
            Some(self.elapsed / self.total as u32)
        }
    }
}

impl Default for BatchResult {
    fn default() -> Self {
        Self::new()
    }
}
