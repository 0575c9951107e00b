//! Shell-script stand-ins for ffmpeg / ffprobe used by unit tests.

use std::fs;
use std::path::{Path, PathBuf};

/// Writes an executable `#!/bin/sh` script named `name` into `dir`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Script body that writes `content` to its last argument (the output path)
/// and exits 0.
pub fn writes_last_arg(content: &str) -> String {
    format!(
        "for last; do :; done\nprintf '%s' '{}' > \"$last\"",
        content
    )
}
