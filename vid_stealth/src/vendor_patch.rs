//! Post-encode vendor tag patch
//!
//! Rewrites the first occurrence of a 4-byte sentinel (by default the
//! `FFMP` vendor code the muxer writes) with a target code. The rewritten
//! bytes go to a temporary file in the same directory which then replaces
//! the original, so the final path never holds a half-written file.
//!
//! Only the first occurrence is patched. A container carrying the sentinel
//! in several boxes keeps the later ones.

use crate::config::StealthConfig;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Patched { offset: usize },
    /// Sentinel absent; the file was not touched
    NotFound,
}

#[derive(Error, Debug)]
pub enum VendorPatchError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write patched copy of {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to replace {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub fn find_sentinel(data: &[u8], sentinel: &[u8; 4]) -> Option<usize> {
    data.windows(sentinel.len()).position(|w| w == sentinel)
}

pub struct VendorPatcher {
    sentinel: [u8; 4],
    target: [u8; 4],
}

impl VendorPatcher {
    pub fn new(sentinel: [u8; 4], target: [u8; 4]) -> Self {
        Self { sentinel, target }
    }

    pub fn from_config(config: &StealthConfig) -> Self {
        Self::new(
            config.vendor_patch.sentinel_bytes(),
            config.vendor_patch.target_bytes(),
        )
    }

    pub fn patch(&self, path: &Path) -> Result<PatchOutcome, VendorPatchError> {
        let mut data = fs::read(path).map_err(|source| VendorPatchError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let Some(offset) = find_sentinel(&data, &self.sentinel) else {
            debug!(file = %path.display(), "Vendor sentinel not present");
            return Ok(PatchOutcome::NotFound);
        };
        data[offset..offset + self.target.len()].copy_from_slice(&self.target);

        let write_err = |source: io::Error| VendorPatchError::Write {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(&data).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        if let Ok(meta) = fs::metadata(path) {
            tmp.as_file()
                .set_permissions(meta.permissions())
                .map_err(write_err)?;
        }

        tmp.persist(path).map_err(|e| VendorPatchError::Persist {
            path: path.to_path_buf(),
            source: e.error,
        })?;

        debug!(file = %path.display(), offset, "Vendor tag patched");
        Ok(PatchOutcome::Patched { offset })
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    proptest! {
        #[test]
        fn prop_patch_changes_at_most_four_bytes(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let dir = TempDir::new().unwrap();
            let file = dir.path().join("f.mov");
            fs::write(&file, &data).unwrap();

            let outcome = VendorPatcher::new(*b"FFMP", *b"appl").patch(&file).unwrap();
            let after = fs::read(&file).unwrap();
            prop_assert_eq!(after.len(), data.len());

            let changed = data.iter().zip(&after).filter(|(a, b)| a != b).count();
            match outcome {
                PatchOutcome::NotFound => prop_assert_eq!(changed, 0),
                PatchOutcome::Patched { offset } => {
                    prop_assert!(changed <= 4);
                    prop_assert_eq!(&after[offset..offset + 4], b"appl");
                }
            }
        }
    }
}
