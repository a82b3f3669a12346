//! Peak limiting for mastering
//!
//! Features:
//! - 4x oversampled true peak detection
//! - Lookahead hold with a moving-average attack ramp
//! - Exponential release
//! - Cheaper sample-peak brickwall mode with a hard safety clip
//!
//! Gain for sample `i` is derived from the peaks at `i..=i + lookahead`,
//! so the ramp into a peak starts before it arrives. Both limiters work on
//! whole buffers and start from unity gain on every call.

use rf_core::{AudioBuffer, RfError, RfResult, Sample, db_to_linear, ensure_range, linear_to_db};
use rf_dsp::envelope::time_constant_coeff;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::oversampling::{DEFAULT_HALF_TAPS, Oversampler};

/// Extra re-measure passes the true peak limiter may take
const MAX_PASSES: usize = 3;

/// Overshoot tolerated before another pass (dB)
const PASS_TOLERANCE_DB: f64 = 0.05;

/// Lookahead used by [`LimiterConfig::brickwall`] (ms)
pub const BRICKWALL_LOOKAHEAD_MS: f64 = 1.5;

/// Limiter operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimiterMode {
    /// Oversampled inter-sample peak limiting
    #[default]
    TruePeak,
    /// Sample peak limiting with a hard clip backstop
    Brickwall,
}

/// Limiter configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Ceiling (dBTP for true peak, dBFS for brickwall)
    pub ceiling_db: f64,
    /// Lookahead time (ms)
    pub lookahead_ms: f64,
    /// Release time (ms)
    pub release_ms: f64,
    /// Oversampling factor for true peak detection (1, 2, 4, 8, 16)
    pub oversampling: usize,
    /// Limiter mode
    pub mode: LimiterMode,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            ceiling_db: -1.0,
            lookahead_ms: 5.0,
            release_ms: 100.0,
            oversampling: 4,
            mode: LimiterMode::TruePeak,
        }
    }
}

impl LimiterConfig {
    pub fn true_peak(ceiling_db: f64) -> Self {
        Self {
            ceiling_db,
            ..Self::default()
        }
    }

    pub fn brickwall(ceiling_db: f64) -> Self {
        Self {
            ceiling_db,
            lookahead_ms: BRICKWALL_LOOKAHEAD_MS,
            oversampling: 1,
            mode: LimiterMode::Brickwall,
            ..Self::default()
        }
    }

    pub fn with_release(mut self, release_ms: f64) -> Self {
        self.release_ms = release_ms;
        self
    }

    pub fn validate(&self) -> RfResult<()> {
        ensure_range("ceiling_db", self.ceiling_db, -24.0, 0.0)?;
        ensure_range("lookahead_ms", self.lookahead_ms, 0.0, 50.0)?;
        ensure_range("release_ms", self.release_ms, 1.0, 5000.0)?;
        if !matches!(self.oversampling, 1 | 2 | 4 | 8 | 16) {
            return Err(RfError::InvalidParam(format!(
                "oversampling must be 1, 2, 4, 8 or 16, got {}",
                self.oversampling
            )));
        }
        Ok(())
    }

    pub fn ceiling_linear(&self) -> f64 {
        db_to_linear(self.ceiling_db)
    }
}

/// Gain trajectory that keeps `peaks[i] * gain[i] <= ceiling`.
///
/// 1. required gain per sample
/// 2. minimum over the next `lookahead` samples (sliding-window min)
/// 3. moving average over `lookahead + 1` samples for the attack ramp
/// 4. instant drop, exponential recovery for release
///
/// Every step keeps the gain at or below the required gain, so the result
/// never lets a detected peak through.
pub fn gain_envelope(
    peaks: &[Sample],
    ceiling: f64,
    lookahead: usize,
    release_coeff: f64,
) -> Vec<f64> {
    let len = peaks.len();
    let required: Vec<f64> = peaks
        .iter()
        .map(|&p| if p > ceiling { ceiling / p } else { 1.0 })
        .collect();

    // Forward-looking minimum via a monotonic deque
    let mut held = vec![1.0; len];
    let mut window: VecDeque<usize> = VecDeque::new();
    for j in (0..len).rev() {
        while window.back().is_some_and(|&k| required[k] >= required[j]) {
            window.pop_back();
        }
        window.push_back(j);
        while window.front().is_some_and(|&k| k > j + lookahead) {
            window.pop_front();
        }
        held[j] = window.front().map_or(1.0, |&k| required[k]);
    }

    // Trailing moving average: every term in the window already covers `i`
    let span = lookahead + 1;
    let mut ramp = vec![1.0; len];
    let mut sum = 0.0;
    for i in 0..len {
        sum += held[i];
        if i >= span {
            sum -= held[i - span];
        }
        let count = (i + 1).min(span) as f64;
        ramp[i] = (sum / count).min(held[i]);
    }

    let mut env = 1.0;
    ramp.iter()
        .map(|&target| {
            env = if target < env {
                target
            } else {
                target + release_coeff * (env - target)
            };
            env
        })
        .collect()
}

fn apply_curve(audio: &mut AudioBuffer, curve: &[f64]) {
    for ch in audio.channels_mut() {
        for (s, g) in ch.iter_mut().zip(curve) {
            *s *= g;
        }
    }
}

fn hard_clip(audio: &mut AudioBuffer, ceiling: f64) {
    for ch in audio.channels_mut() {
        for s in ch.iter_mut() {
            *s = s.clamp(-ceiling, ceiling);
        }
    }
}

fn min_gain_db(curve: &[f64]) -> f64 {
    let min = curve.iter().fold(1.0_f64, |acc, g| acc.min(*g));
    -linear_to_db(min)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRUE PEAK LIMITER
// ═══════════════════════════════════════════════════════════════════════════════

/// True peak limiter with oversampled detection
#[derive(Debug, Clone)]
pub struct TruePeakLimiter {
    config: LimiterConfig,
    oversampler: Oversampler,
    lookahead: usize,
    release_coeff: f64,
    gain_reduction_db: f64,
}

impl TruePeakLimiter {
    pub fn new(config: LimiterConfig, sample_rate: f64) -> RfResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            oversampler: Oversampler::new(config.oversampling, DEFAULT_HALF_TAPS)?,
            lookahead: (config.lookahead_ms * 0.001 * sample_rate).round() as usize,
            release_coeff: time_constant_coeff(config.release_ms, sample_rate),
            gain_reduction_db: 0.0,
        })
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Maximum gain reduction of the last `process` call (dB, positive)
    pub fn gain_reduction_db(&self) -> f64 {
        self.gain_reduction_db
    }

    pub fn process(&mut self, audio: &AudioBuffer) -> AudioBuffer {
        self.gain_reduction_db = 0.0;
        let ceiling = self.config.ceiling_linear();
        let tolerance = ceiling * db_to_linear(PASS_TOLERANCE_DB);
        let mut out = audio.clone();

        for pass in 0..=MAX_PASSES {
            let peaks = self.oversampler.linked_peaks(&out);
            let peak = peaks.iter().fold(0.0_f64, |acc, p| acc.max(*p));
            if peak <= tolerance {
                break;
            }
            let curve = gain_envelope(&peaks, ceiling, self.lookahead, self.release_coeff);
            self.gain_reduction_db += min_gain_db(&curve);
            apply_curve(&mut out, &curve);
            log::trace!(
                "true peak limiter pass {pass}: peak {:.2} dBTP",
                linear_to_db(peak)
            );
        }

        hard_clip(&mut out, ceiling);
        out
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BRICKWALL LIMITER
// ═══════════════════════════════════════════════════════════════════════════════

/// Sample peak limiter with a final hard clip
#[derive(Debug, Clone)]
pub struct BrickwallLimiter {
    config: LimiterConfig,
    lookahead: usize,
    release_coeff: f64,
    gain_reduction_db: f64,
}

impl BrickwallLimiter {
    pub fn new(config: LimiterConfig, sample_rate: f64) -> RfResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            lookahead: (config.lookahead_ms * 0.001 * sample_rate).round() as usize,
            release_coeff: time_constant_coeff(config.release_ms, sample_rate),
            gain_reduction_db: 0.0,
        })
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    pub fn gain_reduction_db(&self) -> f64 {
        self.gain_reduction_db
    }

    pub fn process(&mut self, audio: &AudioBuffer) -> AudioBuffer {
        let ceiling = self.config.ceiling_linear();
        let peaks: Vec<Sample> = (0..audio.len())
            .map(|i| audio.channels().fold(0.0, |acc: Sample, ch| acc.max(ch[i].abs())))
            .collect();
        let curve = gain_envelope(&peaks, ceiling, self.lookahead, self.release_coeff);
        self.gain_reduction_db = min_gain_db(&curve);

        let mut out = audio.clone();
        apply_curve(&mut out, &curve);
        hard_clip(&mut out, ceiling);
        out
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODE DISPATCH
// ═══════════════════════════════════════════════════════════════════════════════

/// Either limiter, chosen by [`LimiterMode`]
#[derive(Debug, Clone)]
pub enum Limiter {
    TruePeak(TruePeakLimiter),
    Brickwall(BrickwallLimiter),
}

impl Limiter {
    pub fn new(config: LimiterConfig, sample_rate: f64) -> RfResult<Self> {
        Ok(match config.mode {
            LimiterMode::TruePeak => Self::TruePeak(TruePeakLimiter::new(config, sample_rate)?),
            LimiterMode::Brickwall => Self::Brickwall(BrickwallLimiter::new(config, sample_rate)?),
        })
    }

    pub fn process(&mut self, audio: &AudioBuffer) -> AudioBuffer {
        match self {
            Self::TruePeak(l) => l.process(audio),
            Self::Brickwall(l) => l.process(audio),
        }
    }

    pub fn gain_reduction_db(&self) -> f64 {
        match self {
            Self::TruePeak(l) => l.gain_reduction_db(),
            Self::Brickwall(l) => l.gain_reduction_db(),
        }
    }
}
