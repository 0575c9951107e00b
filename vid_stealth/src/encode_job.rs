//! Encode job specification
//!
//! An [`EncodeJob`] is a purely descriptive value: trim window, filter chain,
//! codec profile, metadata directives and container flags. Nothing is turned
//! into FFmpeg syntax until [`EncodeJob::to_args`].

use crate::config::{ProresEncoder, StealthConfig};
use crate::filter_graph::FilterChain;
use crate::sampler::SampledParameters;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_utils::common_utils::file_stem_lossy;
use std::path::{Path, PathBuf};

/// Shortest clip ever requested from the encoder, in seconds.
pub const MIN_TRIM_DURATION: f64 = 3.0;
pub const OUTPUT_PREFIX: &str = "ig_";
pub const OUTPUT_EXTENSION: &str = "mov";
pub const VIDEO_HANDLER_NAME: &str = "Core Media Video";
pub const AUDIO_HANDLER_NAME: &str = "Core Media Audio";
pub const CONTAINER_BRAND: &str = "qt";
pub const PRORES_VENDOR: &str = "appl";

/// Descriptive tags blanked in aggressive mode.
pub const BLANKED_FIELDS: [&str; 16] = [
    "title",
    "artist",
    "album",
    "date",
    "track",
    "genre",
    "comment",
    "encoder",
    "creation_time",
    "major_brand",
    "minor_version",
    "compatible_brands",
    "software",
    "make",
    "model",
    "location",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecMode {
    /// Baseline H.264, the most widely accepted upload format
    #[default]
    H264,
    /// iPhone-like HEVC tagged `hvc1`
    Hevc,
    /// ProRes with an Apple vendor code
    ProresApple,
}

impl CodecMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodecMode::H264 => "h264",
            CodecMode::Hevc => "hevc",
            CodecMode::ProresApple => "prores_apple",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataMode {
    Minimal,
    #[default]
    Aggressive,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimWindow {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
}

impl TrimWindow {
    /// Cuts `start` off the head and `end` off the tail, never leaving less
    /// than [`MIN_TRIM_DURATION`].
    pub fn compute(source_duration: f64, start: f64, end: f64) -> Self {
        let duration = (source_duration - start - end).max(MIN_TRIM_DURATION);
        Self {
            start,
            end,
            duration,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CodecProfile {
    H264 {
        bitrate_k: i64,
        framerate: i64,
    },
    Hevc {
        bitrate_k: i64,
        framerate: i64,
    },
    ProresApple {
        encoder: ProresEncoder,
        profile: u8,
        fourcc: String,
        qscale: u8,
        framerate: i64,
    },
}

impl CodecProfile {
    fn select(config: &StealthConfig, params: &SampledParameters) -> Self {
        match config.codec_mode {
            CodecMode::H264 => CodecProfile::H264 {
                bitrate_k: params.video_bitrate_k,
                framerate: params.framerate,
            },
            CodecMode::Hevc => CodecProfile::Hevc {
                bitrate_k: params.video_bitrate_k,
                framerate: params.framerate,
            },
            CodecMode::ProresApple => CodecProfile::ProresApple {
                encoder: config.prores.encoder,
                profile: config.prores.profile,
                fourcc: config.prores.fourcc.clone(),
                qscale: config.prores.qscale,
                framerate: params.framerate,
            },
        }
    }

    fn push_args(&self, args: &mut Vec<String>) {
        let mut push = |items: &[&str]| args.extend(items.iter().map(|s| s.to_string()));
        match self {
            CodecProfile::H264 {
                bitrate_k,
                framerate,
            } => {
                push(&["-c:v", "libx264", "-profile:v", "baseline", "-level:v", "3.1"]);
                push(&["-pix_fmt", "yuv420p"]);
                push(&["-b:v", &format!("{}k", bitrate_k)]);
                push(&["-r", &framerate.to_string()]);
                push(&["-tag:v", "avc1", "-preset", "ultrafast", "-crf", "24"]);
                push(&["-tune", "zerolatency"]);
                // no SEI build info, HRD, filler or access unit delimiters
                push(&["-x264-params", "info=0:nal-hrd=none:filler=0:aud=0:annexb=0"]);
            }
            CodecProfile::Hevc {
                bitrate_k,
                framerate,
            } => {
                push(&["-c:v", "libx265", "-pix_fmt", "yuv420p"]);
                push(&["-b:v", &format!("{}k", bitrate_k)]);
                push(&["-r", &framerate.to_string()]);
                push(&["-tag:v", "hvc1", "-preset", "ultrafast"]);
                push(&["-x265-params", "no-info=1"]);
            }
            CodecProfile::ProresApple {
                encoder,
                profile,
                fourcc,
                qscale,
                framerate,
            } => {
                push(&["-c:v", encoder.as_str()]);
                if *encoder == ProresEncoder::ProresKs {
                    push(&["-profile:v", &profile.to_string()]);
                }
                push(&["-pix_fmt", "yuv422p10le"]);
                push(&["-r", &framerate.to_string()]);
                push(&["-vendor", PRORES_VENDOR]);
                push(&["-tag:v", fourcc]);
                push(&["-qscale:v", &qscale.to_string()]);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataScope {
    Container,
    Video,
    Audio,
}

impl MetadataScope {
    fn flag(&self) -> &'static str {
        match self {
            MetadataScope::Container => "-metadata",
            MetadataScope::Video => "-metadata:s:v:0",
            MetadataScope::Audio => "-metadata:s:a:0",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetadataDirective {
    /// Drop the global metadata map copied from the input
    StripGlobal,
    StripChapters,
    /// Write `key=value`; an empty value blanks the tag
    Set {
        scope: MetadataScope,
        key: String,
        value: String,
    },
}

impl MetadataDirective {
    pub fn blank(scope: MetadataScope, key: &str) -> Self {
        Self::set(scope, key, "")
    }

    pub fn set(scope: MetadataScope, key: &str, value: &str) -> Self {
        MetadataDirective::Set {
            scope,
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    fn push_args(&self, args: &mut Vec<String>) {
        match self {
            MetadataDirective::StripGlobal => {
                args.extend(["-map_metadata".to_string(), "-1".to_string()])
            }
            MetadataDirective::StripChapters => {
                args.extend(["-map_chapters".to_string(), "-1".to_string()])
            }
            MetadataDirective::Set { scope, key, value } => {
                args.push(scope.flag().to_string());
                args.push(format!("{}={}", key, value));
            }
        }
    }
}

/// Metadata directives in the order they are handed to the muxer.
pub fn metadata_directives(mode: MetadataMode, codec: CodecMode) -> Vec<MetadataDirective> {
    let mut directives = vec![MetadataDirective::StripGlobal, MetadataDirective::StripChapters];

    if mode == MetadataMode::Aggressive {
        directives.extend(
            BLANKED_FIELDS
                .iter()
                .map(|field| MetadataDirective::blank(MetadataScope::Container, field)),
        );
    }

    for scope in [MetadataScope::Container, MetadataScope::Video, MetadataScope::Audio] {
        directives.push(MetadataDirective::blank(scope, "encoder"));
    }
    directives.push(MetadataDirective::set(
        MetadataScope::Video,
        "handler_name",
        VIDEO_HANDLER_NAME,
    ));
    directives.push(MetadataDirective::set(
        MetadataScope::Audio,
        "handler_name",
        AUDIO_HANDLER_NAME,
    ));

    // stream-level fallback for builds that ignore -vendor
    if codec == CodecMode::ProresApple {
        directives.push(MetadataDirective::set(
            MetadataScope::Video,
            "vendor_id",
            PRORES_VENDOR,
        ));
    }

    directives
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerFlags {
    pub brand: &'static str,
    /// Bit-exact mode on container, video and audio layers
    pub bitexact: bool,
}

impl ContainerFlags {
    pub fn for_mode(mode: MetadataMode) -> Self {
        Self {
            brand: CONTAINER_BRAND,
            bitexact: mode == MetadataMode::Aggressive,
        }
    }

    fn push_args(&self, args: &mut Vec<String>) {
        let fflags = if self.bitexact {
            "+genpts+bitexact"
        } else {
            "+genpts"
        };
        let mut push = |items: &[&str]| args.extend(items.iter().map(|s| s.to_string()));
        push(&["-movflags", "+faststart+empty_moov"]);
        push(&["-write_tmcd", "0"]);
        push(&["-max_muxing_queue_size", "1024"]);
        push(&["-fflags", fflags]);
        if self.bitexact {
            push(&["-flags:v", "+bitexact", "-flags:a", "+bitexact"]);
        }
        push(&["-avoid_negative_ts", "make_zero"]);
        push(&["-threads", "0"]);
        push(&["-brand", self.brand]);
    }
}

/// `ig_<basename>_<suffix>.mov`, where the suffix is the current epoch
/// milliseconds modulo 100000.
pub fn unique_output_path(output_dir: &Path, input: &Path, now: DateTime<Utc>) -> PathBuf {
    let suffix = now.timestamp_millis().rem_euclid(100_000);
    let base = file_stem_lossy(input);
    output_dir.join(format!(
        "{}{}_{}.{}",
        OUTPUT_PREFIX, base, suffix, OUTPUT_EXTENSION
    ))
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub trim: TrimWindow,
    pub filters: FilterChain,
    pub codec: CodecProfile,
    pub audio_bitrate_k: i64,
    pub metadata: Vec<MetadataDirective>,
    pub container: ContainerFlags,
}

impl EncodeJob {
    pub fn build(
        config: &StealthConfig,
        input: &Path,
        source_duration: f64,
        params: &SampledParameters,
        filters: FilterChain,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            input: input.to_path_buf(),
            output: unique_output_path(&config.output_dir, input, now),
            trim: TrimWindow::compute(source_duration, params.cut_start, params.cut_end),
            filters,
            codec: CodecProfile::select(config, params),
            audio_bitrate_k: params.audio_bitrate_k,
            metadata: metadata_directives(config.metadata_mode, config.codec_mode),
            container: ContainerFlags::for_mode(config.metadata_mode),
        }
    }

    /// Full FFmpeg argument list, output path last.
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-ss"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.push(format!("{:.3}", self.trim.start));
        args.push("-i".to_string());
        args.push(self.input.display().to_string());
        args.push("-t".to_string());
        args.push(format!("{:.3}", self.trim.duration));
        args.push("-vf".to_string());
        args.push(self.filters.render_video());
        args.push("-af".to_string());
        args.push(self.filters.render_audio());

        self.codec.push_args(&mut args);

        args.extend(
            [
                "-c:a".to_string(),
                "aac".to_string(),
                "-b:a".to_string(),
                format!("{}k", self.audio_bitrate_k),
                "-profile:a".to_string(),
                "aac_low".to_string(),
            ],
        );

        self.container.push_args(&mut args);
        for directive in &self.metadata {
            directive.push_args(&mut args);
        }

        args.push("-y".to_string());
        args.push(self.output.display().to_string());
        args
    }
}
