//! Randomized parameter draws
//!
//! Every draw comes from an injected RNG so a fixed seed reproduces a whole
//! batch. Continuous values are rounded to [`DECIMAL_PLACES`] and clamped back
//! into their range; integer values are inclusive on both ends.

use crate::config::SwitchSet;
use crate::error::{Result, StealthError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DECIMAL_PLACES: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    #[default]
    Continuous,
    Integer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterRange {
    name: String,
    min: f64,
    max: f64,
    kind: ParamKind,
}

impl ParameterRange {
    pub fn new(name: impl Into<String>, min: f64, max: f64, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    fn integer_bounds(&self) -> (i64, i64) {
        (self.min.ceil() as i64, self.max.floor() as i64)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| StealthError::InvalidRange {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(invalid("bounds must be finite"));
        }
        if self.min > self.max {
            return Err(invalid("min is greater than max"));
        }
        if self.kind == ParamKind::Integer {
            let (lo, hi) = self.integer_bounds();
            if lo > hi {
                return Err(invalid("integer range contains no integer"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Continuous(f64),
    Integer(i64),
}

impl ParamValue {
    pub fn as_f64(self) -> f64 {
        match self {
            ParamValue::Continuous(v) => v,
            ParamValue::Integer(v) => v as f64,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            ParamValue::Continuous(v) => v.round() as i64,
            ParamValue::Integer(v) => v,
        }
    }
}

pub fn round_to_precision(value: f64) -> f64 {
    let scale = 10f64.powi(DECIMAL_PLACES);
    (value * scale).round() / scale
}

pub struct ParameterSampler<R = StdRng> {
    ranges: HashMap<String, ParameterRange>,
    rng: R,
}

impl ParameterSampler<StdRng> {
    /// Sampler over `ranges` seeded from OS entropy.
    pub fn from_entropy(ranges: impl IntoIterator<Item = ParameterRange>) -> Self {
        Self::with_rng(ranges, StdRng::from_entropy())
    }

    /// Deterministic sampler: the same seed yields the same draw sequence.
    pub fn seeded(ranges: impl IntoIterator<Item = ParameterRange>, seed: u64) -> Self {
        Self::with_rng(ranges, StdRng::seed_from_u64(seed))
    }

    pub fn from_config(config: &crate::config::StealthConfig) -> Self {
        match config.seed {
            Some(seed) => Self::seeded(config.parameter_ranges(), seed),
            None => Self::from_entropy(config.parameter_ranges()),
        }
    }
}

impl<R: Rng> ParameterSampler<R> {
    pub fn with_rng(ranges: impl IntoIterator<Item = ParameterRange>, rng: R) -> Self {
        let ranges = ranges
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();
        Self { ranges, rng }
    }

    pub fn range(&self, name: &str) -> Option<&ParameterRange> {
        self.ranges.get(name)
    }

    /// One uniform draw from the configured `[min, max]` of `name`.
    pub fn sample(&mut self, name: &str) -> Result<ParamValue> {
        let range = self
            .ranges
            .get(name)
            .ok_or_else(|| StealthError::UnknownParameter(name.to_string()))?;

        let value = match range.kind {
            ParamKind::Continuous => {
                let raw = self.rng.gen_range(range.min..=range.max);
                ParamValue::Continuous(round_to_precision(raw).clamp(range.min, range.max))
            }
            ParamKind::Integer => {
                let (lo, hi) = range.integer_bounds();
                ParamValue::Integer(self.rng.gen_range(lo..=hi))
            }
        };
        Ok(value)
    }

    pub fn sample_f64(&mut self, name: &str) -> Result<f64> {
        self.sample(name).map(ParamValue::as_f64)
    }

    pub fn sample_i64(&mut self, name: &str) -> Result<i64> {
        self.sample(name).map(ParamValue::as_i64)
    }

    /// Bernoulli gate: `true` with the given probability.
    pub fn chance(&mut self, probability: f64) -> bool {
        self.rng.gen_bool(probability.clamp(0.0, 1.0))
    }

    /// Inclusive integer draw outside the configured table.
    pub fn int_between(&mut self, lo: i64, hi: i64) -> i64 {
        self.rng.gen_range(lo..=hi)
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.rng)
    }
}

// ═══════════════════════════════════════════════════════════════
// Per-file draws
// ═══════════════════════════════════════════════════════════════

pub const HUE_GATE: f64 = 0.8;
pub const ZOOM_GATE: f64 = 0.6;
pub const PIXEL_SHIFT_GATE: f64 = 0.7;
pub const NOISE_GATE: f64 = 0.5;
pub const PITCH_GATE: f64 = 0.8;
pub const NOISE_STRENGTH: (i64, i64) = (2, 5);

/// Candidate output widths; height follows from a 9:16 portrait frame.
pub const RESIZE_WIDTHS: [u32; 6] = [1080, 1200, 1350, 1440, 1620, 1800];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorParams {
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
    pub gamma: f64,
}

/// Everything drawn for one file.
///
/// An effect field is `Some` only when its switch is on and its Bernoulli
/// gate fired; magnitude thresholds are applied later by the filter builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampledParameters {
    pub color: Option<ColorParams>,
    pub hue_degrees: Option<i64>,
    pub zoom_factor: Option<f64>,
    pub pixel_shift: Option<(i64, i64)>,
    pub noise_strength: Option<i64>,
    pub pitch_factor: Option<f64>,
    pub volume_factor: Option<f64>,
    pub resize_width: Option<u32>,
    pub force_reencoding: bool,
    pub cut_start: f64,
    pub cut_end: f64,
    pub framerate: i64,
    pub video_bitrate_k: i64,
    pub audio_bitrate_k: i64,
}

impl SampledParameters {
    pub fn draw<R: Rng>(switches: &SwitchSet, sampler: &mut ParameterSampler<R>) -> Result<Self> {
        let color = if switches.eq {
            Some(ColorParams {
                brightness: sampler.sample_f64("brightness")?,
                contrast: sampler.sample_f64("contrast")?,
                saturation: sampler.sample_f64("saturation")?,
                gamma: sampler.sample_f64("gamma")?,
            })
        } else {
            None
        };

        let hue_degrees = if switches.hue_shift && sampler.chance(HUE_GATE) {
            Some(sampler.sample_i64("hue_shift")?)
        } else {
            None
        };

        let zoom_factor = if switches.zoom && sampler.chance(ZOOM_GATE) {
            Some(sampler.sample_f64("zoom")?)
        } else {
            None
        };

        let pixel_shift = if switches.pixel_shift && sampler.chance(PIXEL_SHIFT_GATE) {
            Some((
                sampler.sample_i64("pixel_shift_x")?,
                sampler.sample_i64("pixel_shift_y")?,
            ))
        } else {
            None
        };

        let noise_strength = if switches.simple_noise && sampler.chance(NOISE_GATE) {
            Some(sampler.int_between(NOISE_STRENGTH.0, NOISE_STRENGTH.1))
        } else {
            None
        };

        let pitch_factor = if switches.audio_pitch && sampler.chance(PITCH_GATE) {
            Some(sampler.sample_f64("audio_pitch")?)
        } else {
            None
        };

        let volume_factor = if switches.volume {
            Some(sampler.sample_f64("volume")?)
        } else {
            None
        };

        let resize_width = if switches.random_resize {
            sampler.pick(&RESIZE_WIDTHS).copied()
        } else {
            None
        };

        Ok(Self {
            color,
            hue_degrees,
            zoom_factor,
            pixel_shift,
            noise_strength,
            pitch_factor,
            volume_factor,
            resize_width,
            force_reencoding: switches.force_reencoding,
            cut_start: sampler.sample_f64("cut_start")?,
            cut_end: sampler.sample_f64("cut_end")?,
            framerate: sampler.sample_i64("framerate")?,
            video_bitrate_k: sampler.sample_i64("video_bitrate")?,
            audio_bitrate_k: sampler.sample_i64("audio_bitrate")?,
        })
    }
}
