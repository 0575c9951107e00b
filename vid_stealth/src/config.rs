//! Static run configuration
//!
//! Loaded once from TOML at startup, validated, then only ever borrowed.
//! Every key is optional; missing ranges are filled from the default table
//! so a config file only needs to mention what it changes.

use crate::encode_job::{CodecMode, MetadataMode};
use crate::error::{Result, StealthError};
use crate::sampler::{ParamKind, ParameterRange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bounds for one sampled parameter, as written in the `[ranges]` table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeSpec {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub kind: ParamKind,
}

impl RangeSpec {
    pub const fn continuous(min: f64, max: f64) -> Self {
        Self { min, max, kind: ParamKind::Continuous }
    }

    pub const fn integer(min: f64, max: f64) -> Self {
        Self { min, max, kind: ParamKind::Integer }
    }
}

pub fn default_ranges() -> BTreeMap<String, RangeSpec> {
    [
        ("framerate", RangeSpec::integer(29.0, 31.0)),
        ("video_bitrate", RangeSpec::integer(2800.0, 3500.0)),
        ("audio_bitrate", RangeSpec::integer(125.0, 135.0)),
        ("brightness", RangeSpec::continuous(-0.02, 0.02)),
        ("contrast", RangeSpec::continuous(0.96, 1.06)),
        ("saturation", RangeSpec::continuous(0.94, 1.08)),
        ("gamma", RangeSpec::continuous(0.95, 1.08)),
        ("zoom", RangeSpec::continuous(1.0, 1.02)),
        ("pixel_shift_x", RangeSpec::integer(-2.0, 2.0)),
        ("pixel_shift_y", RangeSpec::integer(-2.0, 2.0)),
        ("cut_start", RangeSpec::continuous(0.3, 1.0)),
        ("cut_end", RangeSpec::continuous(0.3, 1.2)),
        ("volume", RangeSpec::continuous(0.90, 1.10)),
        ("hue_shift", RangeSpec::integer(-12.0, 12.0)),
        ("audio_pitch", RangeSpec::continuous(0.998, 1.004)),
    ]
    .into_iter()
    .map(|(name, spec)| (name.to_string(), spec))
    .collect()
}

/// Named toggles deciding which effects may activate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchSet {
    pub eq: bool,
    pub hue_shift: bool,
    pub zoom: bool,
    pub pixel_shift: bool,
    pub simple_noise: bool,
    pub audio_pitch: bool,
    pub volume: bool,
    pub random_resize: bool,
    pub force_reencoding: bool,
    pub force_vendor_patch: bool,
}

impl Default for SwitchSet {
    fn default() -> Self {
        Self {
            eq: true,
            hue_shift: true,
            zoom: true,
            pixel_shift: true,
            simple_noise: true,
            audio_pitch: true,
            volume: true,
            random_resize: true,
            force_reencoding: true,
            force_vendor_patch: true,
        }
    }
}

impl SwitchSet {
    pub fn all_disabled() -> Self {
        Self {
            eq: false,
            hue_shift: false,
            zoom: false,
            pixel_shift: false,
            simple_noise: false,
            audio_pitch: false,
            volume: false,
            random_resize: false,
            force_reencoding: false,
            force_vendor_patch: false,
        }
    }

    pub fn enabled_names(&self) -> Vec<&'static str> {
        [
            ("eq", self.eq),
            ("hue_shift", self.hue_shift),
            ("zoom", self.zoom),
            ("pixel_shift", self.pixel_shift),
            ("simple_noise", self.simple_noise),
            ("audio_pitch", self.audio_pitch),
            ("volume", self.volume),
            ("random_resize", self.random_resize),
            ("force_reencoding", self.force_reencoding),
            ("force_vendor_patch", self.force_vendor_patch),
        ]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
        .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProresEncoder {
    #[default]
    ProresKs,
    ProresAw,
}

impl ProresEncoder {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProresEncoder::ProresKs => "prores_ks",
            ProresEncoder::ProresAw => "prores_aw",
        }
    }
}

/// ProRes settings, only read when `codec_mode = "prores_apple"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProresSettings {
    /// Some FFmpeg builds only honor `-vendor` with one of the two encoders
    pub encoder: ProresEncoder,
    /// prores_ks profile index: 0=proxy 1=lt 2=standard 3=hq 4=4444 5=4444xq
    pub profile: u8,
    pub fourcc: String,
    pub qscale: u8,
}

impl Default for ProresSettings {
    fn default() -> Self {
        Self {
            encoder: ProresEncoder::ProresKs,
            profile: 3,
            fourcc: "apch".to_string(),
            qscale: 9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub encode_timeout_secs: u64,
    pub probe_timeout_secs: u64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            encode_timeout_secs: 180,
            probe_timeout_secs: 10,
        }
    }
}

impl ToolSettings {
    pub fn encode_timeout(&self) -> Duration {
        Duration::from_secs(self.encode_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Four-character codes for the post-mux vendor patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VendorPatchSettings {
    pub sentinel: String,
    pub target: String,
}

impl Default for VendorPatchSettings {
    fn default() -> Self {
        Self {
            sentinel: "FFMP".to_string(),
            target: "appl".to_string(),
        }
    }
}

impl VendorPatchSettings {
    pub fn sentinel_bytes(&self) -> [u8; 4] {
        fourcc_bytes(&self.sentinel)
    }

    pub fn target_bytes(&self) -> [u8; 4] {
        fourcc_bytes(&self.target)
    }
}

fn fourcc_bytes(s: &str) -> [u8; 4] {
    let mut out = [b' '; 4];
    for (slot, b) in out.iter_mut().zip(s.bytes()) {
        *slot = b;
    }
    out
}

fn is_fourcc(s: &str) -> bool {
    s.len() == 4 && s.is_ascii()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StealthConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub log_file: PathBuf,
    pub codec_mode: CodecMode,
    pub metadata_mode: MetadataMode,
    /// Fixed RNG seed; unset means a fresh entropy seed per run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub switches: SwitchSet,
    pub prores: ProresSettings,
    pub tools: ToolSettings,
    pub vendor_patch: VendorPatchSettings,
    pub ranges: BTreeMap<String, RangeSpec>,
}

impl Default for StealthConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            log_file: PathBuf::from("video_processing.log"),
            codec_mode: CodecMode::default(),
            metadata_mode: MetadataMode::default(),
            seed: None,
            switches: SwitchSet::default(),
            prores: ProresSettings::default(),
            tools: ToolSettings::default(),
            vendor_patch: VendorPatchSettings::default(),
            ranges: default_ranges(),
        }
    }
}

impl StealthConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| StealthError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: StealthConfig = toml::from_str(text)?;
        for (name, spec) in default_ranges() {
            config.ranges.entry(name).or_insert(spec);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        for range in self.parameter_ranges() {
            range.validate()?;
        }
        if self.tools.encode_timeout_secs == 0 || self.tools.probe_timeout_secs == 0 {
            return Err(StealthError::InvalidConfig(
                "tool timeouts must be at least one second".to_string(),
            ));
        }
        for (label, tag) in [
            ("vendor_patch.sentinel", &self.vendor_patch.sentinel),
            ("vendor_patch.target", &self.vendor_patch.target),
            ("prores.fourcc", &self.prores.fourcc),
        ] {
            if !is_fourcc(tag) {
                return Err(StealthError::InvalidConfig(format!(
                    "{} must be exactly 4 ASCII bytes, got {:?}",
                    label, tag
                )));
            }
        }
        if self.prores.profile > 5 {
            return Err(StealthError::InvalidConfig(format!(
                "prores.profile must be 0-5, got {}",
                self.prores.profile
            )));
        }
        Ok(())
    }

    pub fn parameter_ranges(&self) -> Vec<ParameterRange> {
        self.ranges
            .iter()
            .map(|(name, spec)| ParameterRange::new(name.clone(), spec.min, spec.max, spec.kind))
            .collect()
    }
}
