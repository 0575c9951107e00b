//! Pipeline orchestration
//!
//! One file at a time: probe duration, draw parameters, build the filter
//! chain and job, encode, then optionally patch the vendor tag and verify.
//! Every per-file failure becomes a [`ProcessResult`]; only a missing input
//! directory or an empty one stops the batch, and both do so before any
//! file is touched.

use crate::config::StealthConfig;
use crate::encode_job::{EncodeJob, MetadataMode};
use crate::encoder::{EncodeInvoker, FailureKind};
use crate::error::{Result, StealthError};
use crate::filter_graph::FilterChain;
use crate::sampler::{ParameterSampler, SampledParameters};
use crate::vendor_patch::{PatchOutcome, VendorPatcher};
use crate::verify::{VerificationProbe, VerificationReport};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::Rng;
use shared_utils::batch::{collect_files, BatchResult, VIDEO_EXTENSIONS};
use shared_utils::common_utils::file_name_lossy;
use shared_utils::ffprobe::get_duration;
use shared_utils::report::format_bytes;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Duration assumed when the pre-encode probe fails.
pub const DEFAULT_SOURCE_DURATION: f64 = 30.0;

#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub input: PathBuf,
    pub success: bool,
    pub elapsed: Duration,
    pub output: Option<PathBuf>,
    pub failure: Option<FailureKind>,
    pub message: Option<String>,
    pub patch: Option<PatchOutcome>,
    pub report: Option<VerificationReport>,
}

impl ProcessResult {
    fn failed(input: &Path, kind: FailureKind, message: String, elapsed: Duration) -> Self {
        Self {
            input: input.to_path_buf(),
            success: false,
            elapsed,
            output: None,
            failure: Some(kind),
            message: Some(message),
            patch: None,
            report: None,
        }
    }
}

pub struct Pipeline<'a, R = StdRng> {
    config: &'a StealthConfig,
    sampler: ParameterSampler<R>,
    invoker: EncodeInvoker,
    patcher: VendorPatcher,
    probe: VerificationProbe,
}

impl<'a> Pipeline<'a, StdRng> {
    /// Pipeline seeded from `config.seed`, or from entropy when unset.
    pub fn new(config: &'a StealthConfig) -> Self {
        Self::with_sampler(config, ParameterSampler::from_config(config))
    }
}

impl<'a, R: Rng> Pipeline<'a, R> {
    pub fn with_sampler(config: &'a StealthConfig, sampler: ParameterSampler<R>) -> Self {
        Self {
            config,
            sampler,
            invoker: EncodeInvoker::from_config(config),
            patcher: VendorPatcher::from_config(config),
            probe: VerificationProbe::from_config(config),
        }
    }

    fn source_duration(&self, input: &Path) -> f64 {
        match get_duration(&self.config.tools.ffprobe, input, self.config.tools.probe_timeout()) {
            Ok(d) => d,
            Err(e) => {
                warn!(file = %input.display(), error = %e, "Duration probe failed, assuming {}s", DEFAULT_SOURCE_DURATION);
                DEFAULT_SOURCE_DURATION
            }
        }
    }

    pub fn process_file(&mut self, input: &Path) -> ProcessResult {
        let duration = self.source_duration(input);

        let params = match SampledParameters::draw(&self.config.switches, &mut self.sampler) {
            Ok(p) => p,
            Err(e) => {
                error!(file = %input.display(), kind = %FailureKind::JobSetup, error = %e, "Parameter draw failed");
                return ProcessResult::failed(input, FailureKind::JobSetup, e.to_string(), Duration::ZERO);
            }
        };

        let chain = FilterChain::build(&params);
        for line in chain.video().iter().map(|op| op.describe()) {
            println!("   {}", line);
        }
        for line in chain.audio().iter().map(|op| op.describe()) {
            println!("   {}", line);
        }

        let job = EncodeJob::build(self.config, input, duration, &params, chain, Utc::now());
        debug!(file = %input.display(), trim_start = job.trim.start, trim_duration = job.trim.duration, "Encode job built");

        let encoded = match self.invoker.run(&job) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(file = %input.display(), kind = %e.kind(), error = %e, "Encode failed");
                return ProcessResult::failed(input, e.kind(), e.to_string(), e.elapsed());
            }
        };

        println!(
            "   📦 {} → {} ({:.1}%)",
            format_bytes(encoded.input_size),
            format_bytes(encoded.output_size),
            encoded.size_ratio().unwrap_or(0.0) * 100.0
        );

        let patch = if self.config.switches.force_vendor_patch {
            match self.patcher.patch(&encoded.output) {
                Ok(outcome @ PatchOutcome::Patched { offset }) => {
                    println!("   🏷️  Vendor tag patched at offset {}", offset);
                    Some(outcome)
                }
                Ok(PatchOutcome::NotFound) => {
                    info!(file = %encoded.output.display(), "Vendor sentinel not found, nothing to patch");
                    Some(PatchOutcome::NotFound)
                }
                Err(e) => {
                    warn!(file = %encoded.output.display(), error = %e, "Vendor patch failed");
                    None
                }
            }
        } else {
            None
        };

        let report = if self.config.metadata_mode == MetadataMode::Aggressive {
            match self.probe.run(&encoded.output) {
                Ok(report) => {
                    println!("   🔍 {}", report.summary());
                    if !report.is_clean() {
                        let keys: Vec<&str> = report.suspicious.iter().map(String::as_str).collect();
                        println!("   ⚠️  Remaining fields: {}", keys.join(", "));
                    }
                    Some(report)
                }
                Err(e) => {
                    debug!(file = %encoded.output.display(), error = %e, "Verification unavailable");
                    None
                }
            }
        } else {
            None
        };

        ProcessResult {
            input: input.to_path_buf(),
            success: true,
            elapsed: encoded.elapsed,
            output: Some(encoded.output),
            failure: None,
            message: None,
            patch,
            report,
        }
    }

    /// Processes every video in the input directory, strictly in path order.
    pub fn run_batch(&mut self) -> Result<BatchResult> {
        let config = self.config;
        let input_dir = &config.input_dir;
        if !input_dir.is_dir() {
            return Err(StealthError::InputDirMissing(input_dir.clone()));
        }
        let files = collect_files(input_dir, VIDEO_EXTENSIONS, false);
        if files.is_empty() {
            return Err(StealthError::NoInputFiles(input_dir.clone()));
        }
        fs::create_dir_all(&config.output_dir)?;

        println!("🎬 Found {} video(s) in {}", files.len(), input_dir.display());
        println!(
            "⚙️  Codec: {}, metadata: {:?}",
            config.codec_mode.as_str(),
            config.metadata_mode
        );
        println!("🎛️  Active switches: {}", config.switches.enabled_names().join(", "));
        info!(files = files.len(), codec = config.codec_mode.as_str(), "Batch started");

        let mut batch = BatchResult::new();
        for (i, file) in files.iter().enumerate() {
            let name = file_name_lossy(file);
            println!();
            println!("📹 [{}/{}] {}", i + 1, files.len(), name);

            let result = self.process_file(file);
            if result.success {
                batch.success(result.elapsed);
                println!("   ✅ Done in {:.1}s", result.elapsed.as_secs_f64());
            } else {
                let kind = result.failure.unwrap_or(FailureKind::EncodeFailed);
                let message = result.message.unwrap_or_default();
                println!("   ❌ {}: {}", kind, message);
                batch.fail(file.clone(), kind.to_string(), result.elapsed);
            }
            println!(
                "   📊 {} ok / {} failed / {} remaining",
                batch.succeeded,
                batch.failed,
                files.len() - (i + 1)
            );
        }

        info!(
            succeeded = batch.succeeded,
            failed = batch.failed,
            "Batch finished"
        );
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> StealthConfig {
        StealthConfig {
            input_dir: dir.path().join("input"),
            output_dir: dir.path().join("output"),
            seed: Some(7),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_input_dir_aborts() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let err = Pipeline::new(&config).run_batch().unwrap_err();
        assert!(matches!(err, StealthError::InputDirMissing(_)));
        assert!(err.is_batch_abort());
    }

    #[test]
    fn test_empty_input_dir_attempts_nothing() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::create_dir(&config.input_dir).unwrap();
        std::fs::write(config.input_dir.join("notes.txt"), "not a video").unwrap();

        let err = Pipeline::new(&config).run_batch().unwrap_err();
        assert!(matches!(err, StealthError::NoInputFiles(_)));
        assert!(!config.output_dir.exists());
    }

    #[cfg(unix)]
    mod with_fake_tools {
        use super::*;
        use crate::test_support::write_script;

        const FAKE_FFPROBE: &str = "\
case \"$*\" in
  *show_format*) printf 'codec_tag_string=avc1\\nTAG:handler_name=Core Media Video\\nTAG:handler_name=Core Media Audio\\nTAG:major_brand=qt\\n' ;;
  *) echo 12.5 ;;
esac";

        const FAKE_FFMPEG: &str = "\
case \"$*\" in
  *slow*) exec sleep 5 ;;
  *broken*) echo 'Invalid data found when processing input' >&2; exit 1 ;;
esac
for last; do :; done
printf 'head FFMP tail' > \"$last\"";

        fn setup(dir: &TempDir, inputs: &[&str]) -> StealthConfig {
            let mut config = config_in(dir);
            fs::create_dir(&config.input_dir).unwrap();
            fs::create_dir(&config.output_dir).unwrap();
            for name in inputs {
                fs::write(config.input_dir.join(name), b"source bytes").unwrap();
            }
            config.tools.ffmpeg = write_script(dir.path(), "ffmpeg", FAKE_FFMPEG);
            config.tools.ffprobe = write_script(dir.path(), "ffprobe", FAKE_FFPROBE);
            config.tools.encode_timeout_secs = 1;
            config
        }

        #[test]
        fn test_successful_file_is_patched_and_verified() {
            let dir = TempDir::new().unwrap();
            let config = setup(&dir, &["a.mp4"]);
            let mut pipeline = Pipeline::new(&config);

            let result = pipeline.process_file(&config.input_dir.join("a.mp4"));
            assert!(result.success);
            let output = result.output.unwrap();
            assert!(output.starts_with(&config.output_dir));
            assert_eq!(fs::read(&output).unwrap(), b"head appl tail");
            assert!(matches!(result.patch, Some(PatchOutcome::Patched { offset: 5 })));

            let report = result.report.unwrap();
            assert_eq!(report.codec_tag.as_deref(), Some("avc1"));
            assert_eq!(report.audio_handler.as_deref(), Some("Core Media Audio"));
        }

        #[test]
        fn test_timeout_then_batch_continues() {
            let dir = TempDir::new().unwrap();
            let config = setup(&dir, &["a_slow.mp4", "b.mp4", "c_broken.mkv", "skip.txt"]);
            let mut pipeline = Pipeline::new(&config);

            let slow = pipeline.process_file(&config.input_dir.join("a_slow.mp4"));
            assert!(!slow.success);
            assert_eq!(slow.failure, Some(FailureKind::EncodeTimeout));
            assert_eq!(slow.elapsed, Duration::from_secs(1));

            let batch = pipeline.run_batch().unwrap();
            assert_eq!(batch.total, 3);
            assert_eq!(batch.succeeded, 1);
            assert_eq!(batch.failed, 2);
            let failed: Vec<String> = batch.errors.iter().map(|(p, _)| file_name_lossy(p)).collect();
            assert_eq!(failed, vec!["a_slow.mp4", "c_broken.mkv"]);
            assert_eq!(batch.errors[0].1, "EncodeTimeout");
            assert_eq!(batch.errors[1].1, "EncodeFailed");
        }

        #[test]
        fn test_patch_and_verify_can_be_disabled() {
            let dir = TempDir::new().unwrap();
            let mut config = setup(&dir, &["a.mp4"]);
            config.switches.force_vendor_patch = false;
            config.metadata_mode = MetadataMode::Minimal;
            let mut pipeline = Pipeline::new(&config);

            let result = pipeline.process_file(&config.input_dir.join("a.mp4"));
            assert!(result.success);
            assert!(result.patch.is_none());
            assert!(result.report.is_none());
            assert_eq!(fs::read(result.output.unwrap()).unwrap(), b"head FFMP tail");
        }

        #[test]
        fn test_failed_duration_probe_falls_back() {
            let dir = TempDir::new().unwrap();
            let mut config = setup(&dir, &["a.mp4"]);
            config.tools.ffprobe = write_script(dir.path(), "ffprobe-broken", "exit 1");
            let mut pipeline = Pipeline::new(&config);

            assert_eq!(
                pipeline.source_duration(&config.input_dir.join("a.mp4")),
                DEFAULT_SOURCE_DURATION
            );
            assert!(pipeline.process_file(&config.input_dir.join("a.mp4")).success);
        }
    }
}
