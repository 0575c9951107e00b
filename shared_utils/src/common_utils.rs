//! Common Utilities Module
//!
//! Small path helpers shared by input discovery and output naming.

use anyhow::{Context, Result};
use std::path::Path;

// ═══════════════════════════════════════════════════════════════
// File Operations
// ═══════════════════════════════════════════════════════════════

/// Returns the file extension in lowercase, or an empty string when absent.
///
/// # Examples
/// ```
/// use std::path::Path;
/// use shared_utils::common_utils::get_extension_lowercase;
///
/// assert_eq!(get_extension_lowercase(Path::new("clip.MOV")), "mov");
/// assert_eq!(get_extension_lowercase(Path::new("clip.mp4")), "mp4");
/// assert_eq!(get_extension_lowercase(Path::new("noext")), "");
/// ```
pub fn get_extension_lowercase(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Case-insensitive extension check. `extensions` are given without the dot.
///
/// # Examples
/// ```
/// use std::path::Path;
/// use shared_utils::common_utils::has_extension;
///
/// let extensions = &["mp4", "mov"];
/// assert!(has_extension(Path::new("clip.MP4"), extensions));
/// assert!(!has_extension(Path::new("notes.txt"), extensions));
/// ```
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let ext = get_extension_lowercase(path);
    extensions.contains(&ext.as_str())
}

/// File name without its extension, lossily converted to UTF-8.
pub fn file_stem_lossy(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// File name (with extension), lossily converted to UTF-8.
pub fn file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Creates `dir` and all missing parents. Existing directories are fine.
pub fn ensure_dir_exists(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_has_extension_case_insensitive() {
        let exts = &["mp4", "mkv"];
        assert!(has_extension(Path::new("a.MKV"), exts));
        assert!(has_extension(Path::new("dir/b.Mp4"), exts));
        assert!(!has_extension(Path::new("c.avi"), exts));
        assert!(!has_extension(Path::new("mp4"), exts));
    }

    #[test]
    fn test_file_stem_lossy() {
        assert_eq!(file_stem_lossy(Path::new("/x/holiday.final.mov")), "holiday.final");
        assert_eq!(file_stem_lossy(Path::new("plain")), "plain");
    }

    #[test]
    fn test_file_name_lossy() {
        assert_eq!(file_name_lossy(Path::new("/x/clip.mp4")), "clip.mp4");
    }

    #[test]
    fn test_ensure_dir_exists_nested() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b");
        ensure_dir_exists(&nested).unwrap();
        assert!(nested.is_dir());
        // second call is a no-op
        ensure_dir_exists(&nested).unwrap();
    }
}
