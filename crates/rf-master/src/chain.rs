//! Complete mastering chain
//!
//! EQ → compression → limiting → loudness normalization, always in that
//! order, optionally followed by a brickwall peak guard at the ceiling.

use rf_core::{AudioBuffer, RfResult, ensure_range};
use rf_dsp::dynamics::{Compressor, CompressorConfig};
use rf_dsp::eq::{EqBand, ParametricEq};
use serde::{Deserialize, Serialize};

use crate::limiter::{BrickwallLimiter, Limiter, LimiterConfig, LimiterMode};
use crate::loudness::{LUFS_FLOOR, LoudnessMeasurement, LoudnessMeter};
use crate::normalize::LoudnessNormalizer;

/// Master bus configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    /// Master EQ, applied in order
    pub eq_bands: Vec<EqBand>,
    /// Glue compressor
    pub compressor: CompressorConfig,
    /// Limiter ceiling (dBTP / dBFS depending on mode)
    pub limiter_ceiling_db: f64,
    /// Integrated loudness target (LUFS)
    pub target_lufs: f64,
    pub limiter_mode: LimiterMode,
    pub limiter_release_ms: f64,
    /// Brickwall pass after normalization so makeup gain cannot cross the ceiling
    pub peak_guard: bool,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            eq_bands: vec![EqBand::highpass(30.0, std::f64::consts::FRAC_1_SQRT_2)],
            compressor: CompressorConfig::new(-12.0, 2.0, 10.0, 100.0),
            limiter_ceiling_db: -1.0,
            target_lufs: -14.0,
            limiter_mode: LimiterMode::TruePeak,
            limiter_release_ms: 100.0,
            peak_guard: true,
        }
    }
}

impl MasterConfig {
    /// Flat EQ, unity compression; only limiting and normalization act
    pub fn transparent() -> Self {
        Self {
            eq_bands: Vec::new(),
            compressor: CompressorConfig::unity(),
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target_lufs: f64) -> Self {
        self.target_lufs = target_lufs;
        self
    }

    pub fn with_ceiling(mut self, ceiling_db: f64) -> Self {
        self.limiter_ceiling_db = ceiling_db;
        self
    }

    pub fn limiter_config(&self) -> LimiterConfig {
        let base = match self.limiter_mode {
            LimiterMode::TruePeak => LimiterConfig::true_peak(self.limiter_ceiling_db),
            LimiterMode::Brickwall => LimiterConfig::brickwall(self.limiter_ceiling_db),
        };
        base.with_release(self.limiter_release_ms)
    }

    pub fn validate(&self, sample_rate: f64) -> RfResult<()> {
        for band in &self.eq_bands {
            band.validate(sample_rate)?;
        }
        self.compressor.validate()?;
        ensure_range("target_lufs", self.target_lufs, -60.0, 0.0)?;
        self.limiter_config().validate()
    }
}

/// Everything the master chain produced for one render
#[derive(Debug, Clone)]
pub struct MasterOutput {
    pub audio: AudioBuffer,
    /// Loudness entering the normalizer (LUFS)
    pub input_lufs: f64,
    pub normalization_gain_db: f64,
    /// Maximum limiter gain reduction (dB)
    pub limiter_reduction_db: f64,
    /// Loudness report of the final audio
    pub loudness: LoudnessMeasurement,
}

impl MasterOutput {
    fn empty() -> Self {
        Self {
            audio: AudioBuffer::empty_stereo(),
            input_lufs: LUFS_FLOOR,
            normalization_gain_db: 0.0,
            limiter_reduction_db: 0.0,
            loudness: LoudnessMeasurement::silence(),
        }
    }
}

/// Mastering chain for one sample rate
#[derive(Debug, Clone)]
pub struct MasterChain {
    config: MasterConfig,
    sample_rate: f64,
    compressor: Compressor,
    limiter: Limiter,
    normalizer: LoudnessNormalizer,
    guard: BrickwallLimiter,
    meter: LoudnessMeter,
}

impl MasterChain {
    pub fn new(config: MasterConfig, sample_rate: f64) -> RfResult<Self> {
        config.validate(sample_rate)?;
        let guard_config = LimiterConfig::brickwall(config.limiter_ceiling_db)
            .with_release(config.limiter_release_ms);
        Ok(Self {
            compressor: Compressor::new(config.compressor, sample_rate)?,
            limiter: Limiter::new(config.limiter_config(), sample_rate)?,
            normalizer: LoudnessNormalizer::new(sample_rate, config.target_lufs)?,
            guard: BrickwallLimiter::new(guard_config, sample_rate)?,
            meter: LoudnessMeter::new(sample_rate)?,
            config,
            sample_rate,
        })
    }

    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    pub fn process(&mut self, audio: &AudioBuffer) -> RfResult<MasterOutput> {
        if audio.is_empty() {
            return Ok(MasterOutput::empty());
        }

        let mut input = audio.to_stereo();
        let scrubbed = input.sanitize();
        if scrubbed > 0 {
            log::warn!("master: replaced {scrubbed} non-finite samples with silence");
        }

        let equalized = ParametricEq::apply_bands(&input, &self.config.eq_bands, self.sample_rate)?;
        let compressed = self.compressor.process(&equalized);
        let limited = self.limiter.process(&compressed);
        let limiter_reduction_db = self.limiter.gain_reduction_db();

        let normalized = self.normalizer.process(&limited);
        let mut out = normalized.audio;
        if self.config.peak_guard {
            out = self.guard.process(&out);
        }

        let loudness = self.meter.measure(&out);
        log::debug!(
            "master: comp GR {:.2} dB, limiter GR {:.2} dB, norm {:+.2} dB, out {:.2} LUFS / {:.2} dBTP",
            self.compressor.max_gain_reduction_db(),
            limiter_reduction_db,
            normalized.gain_db,
            loudness.integrated_lufs,
            loudness.true_peak_db
        );

        Ok(MasterOutput {
            audio: out,
            input_lufs: normalized.input_lufs,
            normalization_gain_db: normalized.gain_db,
            limiter_reduction_db,
            loudness,
        })
    }
}
