//! Post-encode metadata verification
//!
//! Reads ffprobe's `-show_format -show_streams` dump of an output file and
//! extracts the container/stream fields that identify the authoring tool.
//! The report is informational only and never changes a file's outcome.

use crate::config::StealthConfig;
use shared_utils::ffprobe::{parse_key_values, show_format_and_streams, FFprobeError};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Keys whose presence with a non-empty value hints at the original tooling.
pub const SUSPICIOUS_KEYS: [&str; 5] = [
    "encoder",
    "vendor_id",
    "compressor",
    "software",
    "creation_time",
];

#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Verification probe failed: {0}")]
    Probe(#[from] FFprobeError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub major_brand: Option<String>,
    pub minor_version: Option<String>,
    pub compatible_brands: Option<String>,
    pub vendor_id: Option<String>,
    /// First `codec_tag_string`, i.e. the video stream's
    pub codec_tag: Option<String>,
    pub video_handler: Option<String>,
    pub audio_handler: Option<String>,
    /// Suspicious keys (as printed by ffprobe) that still carry a value
    pub suspicious: BTreeSet<String>,
}

fn set_once(slot: &mut Option<String>, value: &str) {
    if slot.is_none() {
        *slot = Some(value.to_string());
    }
}

impl VerificationReport {
    pub fn parse(output: &str) -> Self {
        let mut report = Self::default();

        for (key, value) in parse_key_values(output) {
            let bare = key.strip_prefix("tag:").unwrap_or(&key);
            if !value.is_empty() && SUSPICIOUS_KEYS.contains(&bare) {
                report.suspicious.insert(key.clone());
            }

            match key.as_str() {
                "tag:major_brand" => set_once(&mut report.major_brand, &value),
                "tag:minor_version" => set_once(&mut report.minor_version, &value),
                "tag:compatible_brands" => set_once(&mut report.compatible_brands, &value),
                "tag:vendor_id" => set_once(&mut report.vendor_id, &value),
                "codec_tag_string" => set_once(&mut report.codec_tag, &value),
                "tag:handler_name" => {
                    if report.video_handler.is_none() {
                        report.video_handler = Some(value);
                    } else if report.audio_handler.is_none() {
                        report.audio_handler = Some(value);
                    }
                }
                _ => {}
            }
        }

        report
    }

    pub fn is_clean(&self) -> bool {
        self.suspicious.is_empty()
    }

    /// Compact one-line form for console output.
    pub fn summary(&self) -> String {
        fn show(v: &Option<String>) -> &str {
            v.as_deref().unwrap_or("-")
        }
        format!(
            "brand={}, codec_tag={}, tag:vendor_id={}, v_handler={}, a_handler={}",
            show(&self.major_brand),
            show(&self.codec_tag),
            show(&self.vendor_id),
            show(&self.video_handler),
            show(&self.audio_handler),
        )
    }
}

pub struct VerificationProbe {
    ffprobe: PathBuf,
    timeout: Duration,
}

impl VerificationProbe {
    pub fn new(ffprobe: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            timeout,
        }
    }

    pub fn from_config(config: &StealthConfig) -> Self {
        Self::new(config.tools.ffprobe.clone(), config.tools.probe_timeout())
    }

    pub fn run(&self, output: &Path) -> Result<VerificationReport, VerificationError> {
        let dump = show_format_and_streams(&self.ffprobe, output, self.timeout)?;
        Ok(VerificationReport::parse(&dump))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = "\
[STREAM]
index=0
codec_name=h264
codec_tag_string=avc1
TAG:handler_name=Core Media Video
TAG:vendor_id=[0][0][0][0]
TAG:encoder=
[/STREAM]
[STREAM]
index=1
codec_name=aac
codec_tag_string=mp4a
TAG:handler_name=Core Media Audio
[/STREAM]
[FORMAT]
TAG:major_brand=qt
TAG:minor_version=512
TAG:compatible_brands=qt
TAG:creation_time=2024-01-01T00:00:00.000000Z
[/FORMAT]
";

    #[test]
    fn test_parse_structural_fields() {
        let r = VerificationReport::parse(DUMP);
        assert_eq!(r.major_brand.as_deref(), Some("qt"));
        assert_eq!(r.minor_version.as_deref(), Some("512"));
        assert_eq!(r.compatible_brands.as_deref(), Some("qt"));
        assert_eq!(r.codec_tag.as_deref(), Some("avc1"));
        assert_eq!(r.video_handler.as_deref(), Some("Core Media Video"));
        assert_eq!(r.audio_handler.as_deref(), Some("Core Media Audio"));
        assert_eq!(r.vendor_id.as_deref(), Some("[0][0][0][0]"));
    }

    #[test]
    fn test_suspicious_requires_non_empty_value() {
        let r = VerificationReport::parse(DUMP);
        let found: Vec<&str> = r.suspicious.iter().map(String::as_str).collect();
        assert_eq!(found, vec!["tag:creation_time", "tag:vendor_id"]);
        assert!(!r.is_clean());
    }

    #[test]
    fn test_third_handler_is_ignored() {
        let r = VerificationReport::parse(
            "TAG:handler_name=A\nTAG:handler_name=B\nTAG:handler_name=C\n",
        );
        assert_eq!(r.video_handler.as_deref(), Some("A"));
        assert_eq!(r.audio_handler.as_deref(), Some("B"));
    }

    #[test]
    fn test_empty_dump_is_clean() {
        let r = VerificationReport::parse("");
        assert!(r.is_clean());
        assert_eq!(
            r.summary(),
            "brand=-, codec_tag=-, tag:vendor_id=-, v_handler=-, a_handler=-"
        );
    }

    #[test]
    fn test_summary() {
        let r = VerificationReport::parse(DUMP);
        assert_eq!(
            r.summary(),
            "brand=qt, codec_tag=avc1, tag:vendor_id=[0][0][0][0], \
             v_handler=Core Media Video, a_handler=Core Media Audio"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_failure_is_error() {
        use crate::test_support::write_script;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let ffprobe = write_script(dir.path(), "ffprobe", "exit 1");
        let probe = VerificationProbe::new(ffprobe, Duration::from_secs(5));
        assert!(probe.run(&dir.path().join("x.mov")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_reads_dump() {
        use crate::test_support::write_script;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let ffprobe = write_script(
            dir.path(),
            "ffprobe",
            "printf 'codec_tag_string=hvc1\\nTAG:major_brand=qt\\n'",
        );
        let probe = VerificationProbe::new(ffprobe, Duration::from_secs(5));
        let r = probe.run(&dir.path().join("x.mov")).unwrap();
        assert_eq!(r.codec_tag.as_deref(), Some("hvc1"));
        assert_eq!(r.major_brand.as_deref(), Some("qt"));
    }
}
