//! Dynamics processors: compressor with optional upward expander
//!
//! Detection is stereo-linked RMS in the dB domain; the resulting gain
//! trajectory is smoothed with separate attack and release constants and
//! applied identically to every channel.

use rf_core::{
    AudioBuffer, RfResult, SILENCE_DB, Sample, db_to_linear, ensure_finite, ensure_range,
};
use serde::{Deserialize, Serialize};

use crate::Processor;
use crate::envelope::{GainSmoother, RmsDetector};

/// Mean squares below this are treated as silence by the detector
const DETECTOR_FLOOR: f64 = 1e-20;

/// Static soft-knee gain computer.
///
/// Returns the gain reduction in dB (positive = attenuate) for a detector
/// level. Above the knee the reduction is `excess * (1 - 1/ratio)`; inside
/// `threshold ± knee/2` it follows the quadratic interpolation.
#[inline]
pub fn gain_reduction_db(level_db: f64, threshold_db: f64, ratio: f64, knee_db: f64) -> f64 {
    if ratio <= 1.0 {
        return 0.0;
    }
    let slope = 1.0 - 1.0 / ratio;
    let half_knee = knee_db / 2.0;
    let knee_start = threshold_db - half_knee;
    let knee_end = threshold_db + half_knee;

    if knee_db <= 0.0 {
        (level_db - threshold_db).max(0.0) * slope
    } else if level_db <= knee_start {
        0.0
    } else if level_db >= knee_end {
        (level_db - threshold_db) * slope
    } else {
        let x = level_db - knee_start;
        (slope * x * x) / (2.0 * knee_db)
    }
}

/// Compressor configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorConfig {
    /// Threshold (dBFS)
    pub threshold_db: f64,
    /// Ratio, `>= 1`
    pub ratio: f64,
    /// Attack time (ms)
    pub attack_ms: f64,
    /// Release time (ms)
    pub release_ms: f64,
    /// Soft knee width (dB), 0 = hard knee
    pub knee_db: f64,
    /// Makeup gain (dB)
    pub makeup_db: f64,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            threshold_db: -20.0,
            ratio: 4.0,
            attack_ms: 10.0,
            release_ms: 100.0,
            knee_db: 6.0,
            makeup_db: 0.0,
        }
    }
}

impl CompressorConfig {
    /// Ratio 1, no makeup: passes audio through untouched
    pub fn unity() -> Self {
        Self {
            ratio: 1.0,
            ..Self::default()
        }
    }

    pub fn new(threshold_db: f64, ratio: f64, attack_ms: f64, release_ms: f64) -> Self {
        Self {
            threshold_db,
            ratio,
            attack_ms,
            release_ms,
            ..Self::default()
        }
    }

    pub fn with_knee(mut self, knee_db: f64) -> Self {
        self.knee_db = knee_db;
        self
    }

    pub fn with_makeup(mut self, makeup_db: f64) -> Self {
        self.makeup_db = makeup_db;
        self
    }

    pub fn validate(&self) -> RfResult<()> {
        ensure_range("threshold_db", self.threshold_db, -120.0, 24.0)?;
        ensure_range("ratio", self.ratio, 1.0, 1000.0)?;
        ensure_range("attack_ms", self.attack_ms, 0.0, 5000.0)?;
        ensure_range("release_ms", self.release_ms, 0.0, 10000.0)?;
        ensure_range("knee_db", self.knee_db, 0.0, 48.0)?;
        ensure_range("makeup_db", self.makeup_db, -48.0, 48.0)
    }

    /// Static reduction for a detector level
    #[inline]
    pub fn reduction_db(&self, level_db: f64) -> f64 {
        gain_reduction_db(level_db, self.threshold_db, self.ratio, self.knee_db)
    }
}

/// Upward expander configuration.
///
/// Levels between `floor_db` and `threshold_db` are lifted toward the
/// threshold; anything under the floor is left alone so noise stays noise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpanderConfig {
    pub threshold_db: f64,
    pub ratio: f64,
    pub max_boost_db: f64,
    pub floor_db: f64,
}

impl Default for ExpanderConfig {
    fn default() -> Self {
        Self {
            threshold_db: -40.0,
            ratio: 2.0,
            max_boost_db: 6.0,
            floor_db: -70.0,
        }
    }
}

impl ExpanderConfig {
    pub fn validate(&self) -> RfResult<()> {
        ensure_range("expander.threshold_db", self.threshold_db, -120.0, 0.0)?;
        ensure_range("expander.ratio", self.ratio, 1.0, 100.0)?;
        ensure_range("expander.max_boost_db", self.max_boost_db, 0.0, 24.0)?;
        ensure_finite("expander.floor_db", self.floor_db)
    }

    /// Boost in dB (positive = louder) for a detector level
    #[inline]
    pub fn boost_db(&self, level_db: f64) -> f64 {
        if level_db >= self.threshold_db || level_db < self.floor_db || self.ratio <= 1.0 {
            return 0.0;
        }
        ((self.threshold_db - level_db) * (1.0 - 1.0 / self.ratio)).min(self.max_boost_db)
    }
}

/// Stereo-linked RMS compressor
#[derive(Debug, Clone)]
pub struct Compressor {
    config: CompressorConfig,
    expander: Option<ExpanderConfig>,
    detector: RmsDetector,
    smoother: GainSmoother,
    max_gain_reduction_db: f64,
}

impl Compressor {
    pub fn new(config: CompressorConfig, sample_rate: f64) -> RfResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            expander: None,
            detector: RmsDetector::new(RmsDetector::DEFAULT_WINDOW_MS, sample_rate),
            smoother: GainSmoother::new(config.attack_ms, config.release_ms, sample_rate),
            max_gain_reduction_db: 0.0,
        })
    }

    pub fn with_expander(mut self, expander: ExpanderConfig) -> RfResult<Self> {
        expander.validate()?;
        self.expander = Some(expander);
        Ok(self)
    }

    pub fn config(&self) -> &CompressorConfig {
        &self.config
    }

    /// Largest smoothed gain reduction seen during the last `process` call
    pub fn max_gain_reduction_db(&self) -> f64 {
        self.max_gain_reduction_db
    }

    /// Smoothed gain curve (linear) for a buffer, one value per frame.
    ///
    /// State is reset first, so the curve depends only on this buffer.
    pub fn gain_curve(&mut self, audio: &AudioBuffer) -> Vec<f64> {
        self.reset();
        let channels = audio.num_channels().max(1) as f64;
        let makeup_db = self.config.makeup_db;

        (0..audio.len())
            .map(|i| {
                let square_sum: f64 = audio.channels().map(|ch| ch[i] * ch[i]).sum();
                let level_db = self.detect_db(square_sum / channels);
                let target = self.target_db(level_db);
                let smoothed = self.smoother.process(target);
                self.max_gain_reduction_db = self.max_gain_reduction_db.max(smoothed);
                db_to_linear(makeup_db - smoothed)
            })
            .collect()
    }

    /// Compress a whole buffer
    pub fn process(&mut self, audio: &AudioBuffer) -> AudioBuffer {
        if self.is_transparent() {
            self.reset();
            return audio.clone();
        }
        let curve = self.gain_curve(audio);
        let mut out = audio.clone();
        for ch in out.channels_mut() {
            for (s, g) in ch.iter_mut().zip(&curve) {
                *s *= g;
            }
        }
        log::trace!(
            "compressor: threshold {:.1} dB, ratio {:.2}, max GR {:.2} dB",
            self.config.threshold_db,
            self.config.ratio,
            self.max_gain_reduction_db
        );
        out
    }

    /// Ratio 1, no makeup, no expander
    fn is_transparent(&self) -> bool {
        self.config.ratio <= 1.0 && self.config.makeup_db == 0.0 && self.expander.is_none()
    }

    #[inline]
    fn detect_db(&mut self, mean_square: Sample) -> f64 {
        let ms = self.detector.push(mean_square);
        if ms > DETECTOR_FLOOR {
            10.0 * ms.log10()
        } else {
            SILENCE_DB
        }
    }

    /// Net target in dB: positive attenuates, negative boosts
    #[inline]
    fn target_db(&self, level_db: f64) -> f64 {
        let reduction = self.config.reduction_db(level_db);
        let boost = self.expander.map_or(0.0, |e| e.boost_db(level_db));
        reduction - boost
    }
}

impl Processor for Compressor {
    fn reset(&mut self) {
        self.detector.reset();
        self.smoother.reset();
        self.max_gain_reduction_db = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SR: f64 = 48000.0;

    fn sine(freq: f64, amp: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| amp * (2.0 * std::f64::consts::PI * freq * i as f64 / SR).sin())
            .collect()
    }

    #[test]
    fn test_gain_computer_hard_knee() {
        assert_eq!(gain_reduction_db(-30.0, -20.0, 4.0, 0.0), 0.0);
        assert_relative_eq!(gain_reduction_db(-8.0, -20.0, 4.0, 0.0), 9.0);
        assert_eq!(gain_reduction_db(0.0, -20.0, 1.0, 6.0), 0.0);
    }

    #[test]
    fn test_gain_computer_soft_knee_is_continuous() {
        let (t, r, k) = (-20.0, 4.0, 6.0);
        assert_eq!(gain_reduction_db(-23.0, t, r, k), 0.0);
        let inside = gain_reduction_db(-20.0, t, r, k);
        assert!(inside > 0.0 && inside < 1.0);
        let edge = gain_reduction_db(-17.0 + 1e-9, t, r, k);
        assert_relative_eq!(edge, 3.0 * 0.75, epsilon = 1e-6);
    }

    #[test]
    fn test_unity_config_is_identity() {
        let audio = AudioBuffer::stereo(sine(220.0, 0.9, 4800), sine(330.0, 0.9, 4800));
        let mut comp = Compressor::new(CompressorConfig::unity(), SR).unwrap();
        assert_eq!(comp.process(&audio), audio);
        assert_eq!(comp.max_gain_reduction_db(), 0.0);
    }

    #[test]
    fn test_loud_signal_is_reduced() {
        let audio = AudioBuffer::mono(sine(1000.0, 1.0, 48000));
        let config = CompressorConfig::new(-20.0, 4.0, 5.0, 50.0);
        let mut comp = Compressor::new(config, SR).unwrap();
        let out = comp.process(&audio);

        // Sine RMS is -3 dBFS: 17 dB over, 12.75 dB of reduction at steady state
        assert_relative_eq!(comp.max_gain_reduction_db(), 12.75, epsilon = 0.3);
        assert!(out.rms_db() < audio.rms_db() - 10.0);
    }

    #[test]
    fn test_stereo_link_applies_same_gain() {
        let audio = AudioBuffer::stereo(sine(1000.0, 1.0, 4800), sine(1000.0, 0.1, 4800));
        let mut comp = Compressor::new(CompressorConfig::default(), SR).unwrap();
        let out = comp.process(&audio);
        for i in (100..4800).step_by(97) {
            let gl = out.channel(0)[i] / audio.channel(0)[i];
            let gr = out.channel(1)[i] / audio.channel(1)[i];
            if audio.channel(0)[i].abs() > 1e-6 {
                assert_relative_eq!(gl, gr, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_expander_lifts_quiet_material() {
        let audio = AudioBuffer::mono(sine(500.0, 0.003, 96000)); // about -53 dB RMS
        let mut comp = Compressor::new(CompressorConfig::unity(), SR)
            .unwrap()
            .with_expander(ExpanderConfig::default())
            .unwrap();
        let out = comp.process(&audio);
        assert!(out.rms_db() > audio.rms_db() + 5.0);
        assert!(out.rms_db() < audio.rms_db() + 6.01);
    }

    #[test]
    fn test_expander_ignores_noise_floor() {
        let expander = ExpanderConfig::default();
        assert_eq!(expander.boost_db(-90.0), 0.0);
        assert_eq!(expander.boost_db(-10.0), 0.0);
        assert_relative_eq!(expander.boost_db(-46.0), 3.0);
    }

    #[test]
    fn test_silence_stays_silent() {
        let audio = AudioBuffer::silent(rf_core::ChannelLayout::Stereo, 1000);
        let mut comp = Compressor::new(CompressorConfig::default().with_makeup(6.0), SR).unwrap();
        let out = comp.process(&audio);
        assert!(out.is_finite());
        assert_eq!(out.peak(), 0.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = CompressorConfig {
            ratio: 0.5,
            ..Default::default()
        };
        assert!(Compressor::new(bad, SR).is_err());
        assert!(
            CompressorConfig {
                attack_ms: f64::NAN,
                ..Default::default()
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: CompressorConfig =
            serde_json::from_str(r#"{"threshold_db": -12.0, "ratio": 3.0}"#).unwrap();
        assert_eq!(config.threshold_db, -12.0);
        assert_eq!(config.attack_ms, 10.0);
        assert_eq!(config.knee_db, 6.0);
    }
}
