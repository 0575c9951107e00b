//! Filter chain assembly
//!
//! Turns one file's [`SampledParameters`] into ordered video and audio
//! operations. The chain stays structured until the encoder boundary, where
//! [`FilterChain::render_video`] / [`FilterChain::render_audio`] produce the
//! FFmpeg filtergraph text.
//!
//! Order matters: pixel shift runs before the final resize so the padded
//! edge never shows up at output resolution.

use crate::sampler::SampledParameters;
use std::fmt;

pub const HUE_MIN_DEGREES: i64 = 3;
pub const ZOOM_MIN_FACTOR: f64 = 1.005;
pub const PITCH_MIN_DEVIATION: f64 = 0.001;
pub const VOLUME_MIN_DEVIATION: f64 = 0.02;
pub const AUDIO_SAMPLE_RATE: u32 = 44_100;

#[derive(Debug, Clone, PartialEq)]
pub enum VideoOp {
    ColorAdjust {
        brightness: f64,
        contrast: f64,
        saturation: f64,
        gamma: f64,
    },
    HueShift { degrees: i64 },
    Zoom { factor: f64 },
    PixelShift { x: i64, y: i64 },
    Noise { strength: i64 },
    Resize { width: u32, height: u32 },
    /// No-op pixel format pass; forces every frame through the encoder
    FormatPassthrough,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AudioOp {
    PitchShift { factor: f64 },
    VolumeAdjust { factor: f64 },
    AudioFormatPassthrough,
}

impl fmt::Display for VideoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoOp::ColorAdjust {
                brightness,
                contrast,
                saturation,
                gamma,
            } => write!(
                f,
                "eq=brightness={}:contrast={}:saturation={}:gamma={}",
                brightness, contrast, saturation, gamma
            ),
            VideoOp::HueShift { degrees } => write!(f, "hue=h={}", degrees),
            // scale up, then center-crop back to the pre-zoom size
            VideoOp::Zoom { factor } => write!(
                f,
                "scale=trunc(iw*{z}/2)*2:trunc(ih*{z}/2)*2,crop=trunc(iw/{z}/2)*2:trunc(ih/{z}/2)*2",
                z = factor
            ),
            VideoOp::PixelShift { x, y } => {
                let margin = x.abs().max(y.abs());
                write!(
                    f,
                    "pad=iw+{p}:ih+{p}:{m}:{m},crop=iw-{p}:ih-{p}:{cx}:{cy}",
                    p = margin * 2,
                    m = margin,
                    cx = x + margin,
                    cy = y + margin
                )
            }
            VideoOp::Noise { strength } => write!(f, "noise=alls={}:allf=t", strength),
            VideoOp::Resize { width, height } => {
                write!(f, "scale={}:{}:flags=fast_bilinear", width, height)
            }
            VideoOp::FormatPassthrough => write!(f, "format=yuv420p"),
        }
    }
}

impl fmt::Display for AudioOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioOp::PitchShift { factor } => write!(
                f,
                "asetrate={sr}*{factor},aresample={sr}",
                sr = AUDIO_SAMPLE_RATE,
                factor = factor
            ),
            AudioOp::VolumeAdjust { factor } => write!(f, "volume={}", factor),
            AudioOp::AudioFormatPassthrough => write!(f, "aformat=sample_fmts=fltp"),
        }
    }
}

impl VideoOp {
    /// One-line human description for the per-file console output.
    pub fn describe(&self) -> String {
        match self {
            VideoOp::ColorAdjust {
                brightness,
                contrast,
                saturation,
                gamma,
            } => format!(
                "🎨 Color: b={:.3} c={:.3} s={:.3} g={:.3}",
                brightness, contrast, saturation, gamma
            ),
            VideoOp::HueShift { degrees } => format!("🌈 Hue shift: {}°", degrees),
            VideoOp::Zoom { factor } => format!("🔍 Zoom: {:.3}x", factor),
            VideoOp::PixelShift { x, y } => format!("📐 Pixel shift: x={}, y={}", x, y),
            VideoOp::Noise { strength } => format!("📺 Noise: strength={}", strength),
            VideoOp::Resize { width, height } => format!("📱 Resize: {}x{} (9:16)", width, height),
            VideoOp::FormatPassthrough => "🔄 Forced re-encoding (format pass)".to_string(),
        }
    }
}

impl AudioOp {
    pub fn describe(&self) -> String {
        match self {
            AudioOp::PitchShift { factor } => format!("🎵 Audio pitch: {:.4}x", factor),
            AudioOp::VolumeAdjust { factor } => format!("🔊 Volume: {:.3}x", factor),
            AudioOp::AudioFormatPassthrough => "🔄 Forced audio re-encoding".to_string(),
        }
    }
}

fn round_up_even(n: u32) -> u32 {
    n + (n & 1)
}

/// Output frame for a candidate width: both sides even, height = width × 16/9
/// rounded up.
pub fn resize_dimensions(width: u32) -> (u32, u32) {
    let width = round_up_even(width);
    let height = (width * 16).div_ceil(9);
    (width, round_up_even(height))
}

/// Ordered video and audio operations for one file. Neither list is ever
/// empty.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    video: Vec<VideoOp>,
    audio: Vec<AudioOp>,
}

impl FilterChain {
    pub fn build(params: &SampledParameters) -> Self {
        let mut video = Vec::new();
        let mut audio = Vec::new();

        if let Some(c) = params.color {
            video.push(VideoOp::ColorAdjust {
                brightness: c.brightness,
                contrast: c.contrast,
                saturation: c.saturation,
                gamma: c.gamma,
            });
        }

        if let Some(degrees) = params.hue_degrees {
            if degrees.abs() > HUE_MIN_DEGREES {
                video.push(VideoOp::HueShift { degrees });
            }
        }

        if let Some(factor) = params.zoom_factor {
            if factor > ZOOM_MIN_FACTOR {
                video.push(VideoOp::Zoom { factor });
            }
        }

        if let Some((x, y)) = params.pixel_shift {
            if x != 0 || y != 0 {
                video.push(VideoOp::PixelShift { x, y });
            }
        }

        if let Some(strength) = params.noise_strength {
            video.push(VideoOp::Noise { strength });
        }

        if video.is_empty() && params.force_reencoding {
            video.push(VideoOp::FormatPassthrough);
        }

        if let Some(w) = params.resize_width {
            let (width, height) = resize_dimensions(w);
            video.push(VideoOp::Resize { width, height });
        }

        // resize off and nothing else fired
        if video.is_empty() {
            video.push(VideoOp::FormatPassthrough);
        }

        if let Some(factor) = params.pitch_factor {
            if (factor - 1.0).abs() > PITCH_MIN_DEVIATION {
                audio.push(AudioOp::PitchShift { factor });
            }
        }

        if let Some(factor) = params.volume_factor {
            if (factor - 1.0).abs() > VOLUME_MIN_DEVIATION {
                audio.push(AudioOp::VolumeAdjust { factor });
            }
        }

        if audio.is_empty() {
            audio.push(AudioOp::AudioFormatPassthrough);
        }

        Self { video, audio }
    }

    pub fn video(&self) -> &[VideoOp] {
        &self.video
    }

    pub fn audio(&self) -> &[AudioOp] {
        &self.audio
    }

    pub fn render_video(&self) -> String {
        join_ops(&self.video)
    }

    pub fn render_audio(&self) -> String {
        join_ops(&self.audio)
    }
}

fn join_ops<T: fmt::Display>(ops: &[T]) -> String {
    ops.iter()
        .map(|op| op.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StealthConfig, SwitchSet};
    use crate::sampler::{ColorParams, ParameterSampler, RESIZE_WIDTHS};

    fn full_params() -> SampledParameters {
        SampledParameters {
            color: Some(ColorParams {
                brightness: 0.01,
                contrast: 1.02,
                saturation: 0.98,
                gamma: 1.0,
            }),
            hue_degrees: Some(-7),
            zoom_factor: Some(1.015),
            pixel_shift: Some((1, -2)),
            noise_strength: Some(3),
            pitch_factor: Some(1.003),
            volume_factor: Some(0.93),
            resize_width: Some(1080),
            force_reencoding: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_resize_dimensions_known_widths() {
        assert_eq!(resize_dimensions(1080), (1080, 1920));
        assert_eq!(resize_dimensions(1200), (1200, 2134));
        assert_eq!(resize_dimensions(1350), (1350, 2400));
        assert_eq!(resize_dimensions(1440), (1440, 2560));
        assert_eq!(resize_dimensions(1620), (1620, 2880));
        assert_eq!(resize_dimensions(1800), (1800, 3200));
    }

    #[test]
    fn test_resize_dimensions_always_even() {
        for w in RESIZE_WIDTHS {
            let (width, height) = resize_dimensions(w);
            assert_eq!(width % 2, 0);
            assert_eq!(height % 2, 0);
            let exact = w as f64 * 16.0 / 9.0;
            assert!(height as f64 >= exact && (height as f64) < exact + 2.0);
        }
        assert_eq!(resize_dimensions(1081), (1082, 1924));
    }

    #[test]
    fn test_full_chain_order() {
        let chain = FilterChain::build(&full_params());
        let kinds: Vec<&str> = chain
            .video()
            .iter()
            .map(|op| match op {
                VideoOp::ColorAdjust { .. } => "color",
                VideoOp::HueShift { .. } => "hue",
                VideoOp::Zoom { .. } => "zoom",
                VideoOp::PixelShift { .. } => "shift",
                VideoOp::Noise { .. } => "noise",
                VideoOp::Resize { .. } => "resize",
                VideoOp::FormatPassthrough => "format",
            })
            .collect();
        assert_eq!(kinds, vec!["color", "hue", "zoom", "shift", "noise", "resize"]);
        assert_eq!(
            chain.audio(),
            &[
                AudioOp::PitchShift { factor: 1.003 },
                AudioOp::VolumeAdjust { factor: 0.93 }
            ]
        );
    }

    #[test]
    fn test_render_full_chain() {
        let chain = FilterChain::build(&full_params());
        assert_eq!(
            chain.render_video(),
            "eq=brightness=0.01:contrast=1.02:saturation=0.98:gamma=1,\
             hue=h=-7,\
             scale=trunc(iw*1.015/2)*2:trunc(ih*1.015/2)*2,crop=trunc(iw/1.015/2)*2:trunc(ih/1.015/2)*2,\
             pad=iw+4:ih+4:2:2,crop=iw-4:ih-4:3:0,\
             noise=alls=3:allf=t,\
             scale=1080:1920:flags=fast_bilinear"
        );
        assert_eq!(
            chain.render_audio(),
            "asetrate=44100*1.003,aresample=44100,volume=0.93"
        );
    }

    #[test]
    fn test_small_magnitudes_are_dropped() {
        let params = SampledParameters {
            hue_degrees: Some(3),
            zoom_factor: Some(1.005),
            pixel_shift: Some((0, 0)),
            pitch_factor: Some(1.0005),
            volume_factor: Some(1.01),
            force_reencoding: true,
            ..Default::default()
        };
        let chain = FilterChain::build(&params);
        assert_eq!(chain.video(), &[VideoOp::FormatPassthrough]);
        assert_eq!(chain.audio(), &[AudioOp::AudioFormatPassthrough]);
    }

    #[test]
    fn test_magnitudes_just_past_threshold_are_kept() {
        let params = SampledParameters {
            hue_degrees: Some(-4),
            zoom_factor: Some(1.006),
            pixel_shift: Some((0, 1)),
            volume_factor: Some(1.05),
            ..Default::default()
        };
        let chain = FilterChain::build(&params);
        assert_eq!(chain.video().len(), 3);
        assert_eq!(chain.audio(), &[AudioOp::VolumeAdjust { factor: 1.05 }]);
    }

    #[test]
    fn test_forced_pass_precedes_resize() {
        let params = SampledParameters {
            resize_width: Some(1350),
            force_reencoding: true,
            ..Default::default()
        };
        let chain = FilterChain::build(&params);
        assert_eq!(
            chain.video(),
            &[
                VideoOp::FormatPassthrough,
                VideoOp::Resize {
                    width: 1350,
                    height: 2400
                }
            ]
        );
    }

    #[test]
    fn test_no_force_but_resize_only() {
        let params = SampledParameters {
            resize_width: Some(1080),
            ..Default::default()
        };
        let chain = FilterChain::build(&params);
        assert_eq!(chain.render_video(), "scale=1080:1920:flags=fast_bilinear");
    }

    #[test]
    fn test_everything_disabled_still_non_empty() {
        let chain = FilterChain::build(&SampledParameters::default());
        assert_eq!(chain.render_video(), "format=yuv420p");
        assert_eq!(chain.render_audio(), "aformat=sample_fmts=fltp");
    }

    #[test]
    fn test_pixel_shift_margin_follows_offset() {
        let op = VideoOp::PixelShift { x: -3, y: 1 };
        assert_eq!(op.to_string(), "pad=iw+6:ih+6:3:3,crop=iw-6:ih-6:0:4");
    }

    fn switches_from_mask(mask: u32) -> SwitchSet {
        let bit = |i: u32| mask & (1 << i) != 0;
        SwitchSet {
            eq: bit(0),
            hue_shift: bit(1),
            zoom: bit(2),
            pixel_shift: bit(3),
            simple_noise: bit(4),
            audio_pitch: bit(5),
            volume: bit(6),
            random_resize: bit(7),
            force_reencoding: bit(8),
            force_vendor_patch: bit(9),
        }
    }

    #[test]
    fn test_chain_never_empty_for_any_switch_combination() {
        let ranges = StealthConfig::default().parameter_ranges();
        let mut sampler = ParameterSampler::seeded(ranges, 2024);
        for mask in 0..(1u32 << 10) {
            let switches = switches_from_mask(mask);
            for _ in 0..4 {
                let params = SampledParameters::draw(&switches, &mut sampler).unwrap();
                let chain = FilterChain::build(&params);
                assert!(!chain.video().is_empty(), "empty video chain for mask {:#b}", mask);
                assert!(!chain.audio().is_empty(), "empty audio chain for mask {:#b}", mask);
                if switches.random_resize {
                    assert!(matches!(chain.video().last(), Some(VideoOp::Resize { .. })));
                }
            }
        }
    }

    #[test]
    fn test_describe_lines() {
        assert_eq!(VideoOp::HueShift { degrees: 5 }.describe(), "🌈 Hue shift: 5°");
        assert_eq!(AudioOp::VolumeAdjust { factor: 1.1 }.describe(), "🔊 Volume: 1.100x");
    }
}
