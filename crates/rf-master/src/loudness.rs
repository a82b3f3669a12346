//! Loudness measurement
//!
//! ITU-R BS.1770-4 K-weighting with whole-buffer integration. The headline
//! integrated value is the ungated mean square of the full buffer, which
//! scales exactly with input gain; gated integrated loudness, momentary and
//! short-term maxima and loudness range are reported alongside it.

use rf_core::{AudioBuffer, RfError, RfResult, Sample, linear_to_db};
use rf_dsp::biquad::{BiquadCoeffs, BiquadTDF2};
use rf_dsp::{MonoProcessor, Processor};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::oversampling::true_peak;

/// Reported loudness for silence or near-zero energy (LUFS)
pub const LUFS_FLOOR: f64 = -70.0;

/// K-weighted mean square at or below which audio counts as silent
pub const SILENCE_POWER: f64 = 1e-12;

/// BS.1770 absolute gate (LUFS)
pub const ABSOLUTE_GATE: f64 = -70.0;

/// Relative gate for integrated loudness (LU below the ungated mean)
pub const RELATIVE_GATE: f64 = -10.0;

/// Relative gate for loudness range (EBU Tech 3342)
pub const LRA_RELATIVE_GATE: f64 = -20.0;

const MOMENTARY_MS: f64 = 400.0;
const SHORT_TERM_MS: f64 = 3000.0;
const HOP_MS: f64 = 100.0;

/// Mean square → LUFS.
///
/// Only silence maps to [`LUFS_FLOOR`]; quiet but audible material reads
/// its true value, which may sit below the floor.
#[inline]
pub fn power_to_lufs(power: f64) -> f64 {
    if power > SILENCE_POWER && power.is_finite() {
        -0.691 + 10.0 * power.log10()
    } else {
        LUFS_FLOOR
    }
}

#[inline]
fn lufs_to_power(lufs: f64) -> f64 {
    10.0_f64.powf((lufs + 0.691) / 10.0)
}

// ═══════════════════════════════════════════════════════════════════════════════
// K-WEIGHTING FILTER (ITU-R BS.1770-4)
// ═══════════════════════════════════════════════════════════════════════════════

/// K-weighting pre-filter (two stages)
/// Stage 1: High shelf, about +4 dB above 2 kHz
/// Stage 2: High-pass, 38 Hz
#[derive(Debug, Clone)]
pub struct KWeightingFilter {
    shelf: BiquadTDF2,
    highpass: BiquadTDF2,
}

impl KWeightingFilter {
    pub fn new(sample_rate: f64) -> RfResult<Self> {
        // The shelf corner must sit below Nyquist
        if !(sample_rate.is_finite() && sample_rate >= 8000.0) {
            return Err(RfError::InvalidParam(format!(
                "loudness measurement needs a sample rate >= 8 kHz, got {sample_rate}"
            )));
        }
        Ok(Self {
            shelf: BiquadTDF2::new(Self::shelf_coeffs(sample_rate)),
            highpass: BiquadTDF2::new(Self::highpass_coeffs(sample_rate)),
        })
    }

    /// Stage 1 coefficients, computed analytically
    pub fn shelf_coeffs(fs: f64) -> BiquadCoeffs {
        let gain_db = 3.999843853973347;
        let f0 = 1681.974450955533;
        let q = 0.7071752369554196;

        let k = (PI * f0 / fs).tan();
        let vh = 10.0_f64.powf(gain_db / 20.0);
        let vb = vh.powf(0.4996667741545416);
        let a0 = 1.0 + k / q + k * k;

        BiquadCoeffs {
            b0: (vh + vb * k / q + k * k) / a0,
            b1: 2.0 * (k * k - vh) / a0,
            b2: (vh - vb * k / q + k * k) / a0,
            a1: 2.0 * (k * k - 1.0) / a0,
            a2: (1.0 - k / q + k * k) / a0,
        }
    }

    /// Stage 2 coefficients, computed analytically
    pub fn highpass_coeffs(fs: f64) -> BiquadCoeffs {
        let f0 = 38.13547087602444;
        let q = 0.5003270373238773;

        let k = (PI * f0 / fs).tan();
        let a0 = 1.0 + k / q + k * k;

        BiquadCoeffs {
            b0: 1.0,
            b1: -2.0,
            b2: 1.0,
            a1: 2.0 * (k * k - 1.0) / a0,
            a2: (1.0 - k / q + k * k) / a0,
        }
    }

    /// Filter one channel from zero state
    pub fn filter(&mut self, input: &[Sample]) -> Vec<Sample> {
        self.shelf.reset();
        self.highpass.reset();
        input
            .iter()
            .map(|&x| {
                let y = self.shelf.process_sample(x);
                self.highpass.process_sample(y)
            })
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MEASUREMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Full loudness report for one buffer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoudnessMeasurement {
    /// Ungated whole-buffer loudness (LUFS)
    pub integrated_lufs: f64,
    /// BS.1770 gated integrated loudness (LUFS)
    pub gated_lufs: f64,
    /// Loudest 400 ms window (LUFS)
    pub momentary_max_lufs: f64,
    /// Loudest 3 s window (LUFS)
    pub short_term_max_lufs: f64,
    /// Loudness range (LU)
    pub loudness_range_lu: f64,
    /// Sample peak (dBFS)
    pub sample_peak_db: f64,
    /// 4x true peak (dBTP)
    pub true_peak_db: f64,
}

impl LoudnessMeasurement {
    /// Report for an empty or silent buffer
    pub fn silence() -> Self {
        Self {
            integrated_lufs: LUFS_FLOOR,
            gated_lufs: LUFS_FLOOR,
            momentary_max_lufs: LUFS_FLOOR,
            short_term_max_lufs: LUFS_FLOOR,
            loudness_range_lu: 0.0,
            sample_peak_db: f64::NEG_INFINITY,
            true_peak_db: f64::NEG_INFINITY,
        }
    }
}

/// Whole-buffer loudness meter
#[derive(Debug, Clone)]
pub struct LoudnessMeter {
    sample_rate: f64,
    filter: KWeightingFilter,
}

impl LoudnessMeter {
    pub fn new(sample_rate: f64) -> RfResult<Self> {
        Ok(Self {
            sample_rate,
            filter: KWeightingFilter::new(sample_rate)?,
        })
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// K-weighted squares summed over channels, one value per frame
    fn weighted_power(&mut self, audio: &AudioBuffer) -> Vec<f64> {
        let mut power = vec![0.0; audio.len()];
        for ch in audio.channels() {
            let weighted = self.filter.filter(ch);
            for (p, y) in power.iter_mut().zip(&weighted) {
                // Non-finite input contributes nothing
                if y.is_finite() {
                    *p += y * y;
                }
            }
        }
        power
    }

    /// Σ channel mean squares of the K-weighted signal; 0 for an empty buffer
    pub fn integrated_power(&mut self, audio: &AudioBuffer) -> f64 {
        if audio.is_empty() {
            return 0.0;
        }
        let power = self.weighted_power(audio);
        power.iter().sum::<f64>() / power.len() as f64
    }

    /// Ungated integrated loudness: `-0.691 + 10·log10(Σ channel mean squares)`
    pub fn integrated(&mut self, audio: &AudioBuffer) -> f64 {
        power_to_lufs(self.integrated_power(audio))
    }

    /// Every metric in one pass over the K-weighted signal
    pub fn measure(&mut self, audio: &AudioBuffer) -> LoudnessMeasurement {
        if audio.is_empty() {
            return LoudnessMeasurement::silence();
        }
        let power = self.weighted_power(audio);
        let integrated_lufs = power_to_lufs(power.iter().sum::<f64>() / power.len() as f64);

        let hop = self.ms_to_samples(HOP_MS);
        let momentary = windowed_power(&power, self.ms_to_samples(MOMENTARY_MS), hop);
        let short_term = windowed_power(&power, self.ms_to_samples(SHORT_TERM_MS), hop);

        let max_lufs = |blocks: &[f64]| {
            power_to_lufs(blocks.iter().fold(0.0_f64, |acc, p| acc.max(*p)))
        };

        let measurement = LoudnessMeasurement {
            integrated_lufs,
            gated_lufs: gated_loudness(&momentary),
            momentary_max_lufs: max_lufs(&momentary),
            short_term_max_lufs: max_lufs(&short_term),
            loudness_range_lu: loudness_range(&short_term),
            sample_peak_db: audio.peak_db(),
            true_peak_db: linear_to_db(true_peak(audio)),
        };
        log::trace!("loudness: {measurement:?}");
        measurement
    }

    fn ms_to_samples(&self, ms: f64) -> usize {
        ((ms * 0.001 * self.sample_rate).round() as usize).max(1)
    }
}

/// Mean power of each `window`-sample block, advancing by `hop`.
///
/// A buffer shorter than one window yields a single block over all of it.
fn windowed_power(power: &[f64], window: usize, hop: usize) -> Vec<f64> {
    if power.is_empty() {
        return Vec::new();
    }
    if power.len() <= window {
        return vec![power.iter().sum::<f64>() / power.len() as f64];
    }
    let mut prefix = Vec::with_capacity(power.len() + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for p in power {
        acc += p;
        prefix.push(acc);
    }
    (0..=power.len() - window)
        .step_by(hop.max(1))
        .map(|start| ((prefix[start + window] - prefix[start]) / window as f64).max(0.0))
        .collect()
}

/// BS.1770 two-stage gated loudness over 400 ms blocks
fn gated_loudness(blocks: &[f64]) -> f64 {
    let absolute = lufs_to_power(ABSOLUTE_GATE);
    let above_abs: Vec<f64> = blocks.iter().copied().filter(|&p| p > absolute).collect();
    if above_abs.is_empty() {
        return LUFS_FLOOR;
    }
    let ungated = above_abs.iter().sum::<f64>() / above_abs.len() as f64;
    let relative = lufs_to_power(power_to_lufs(ungated) + RELATIVE_GATE);

    let gated: Vec<f64> = above_abs.into_iter().filter(|&p| p > relative).collect();
    if gated.is_empty() {
        return LUFS_FLOOR;
    }
    power_to_lufs(gated.iter().sum::<f64>() / gated.len() as f64)
}

/// EBU Tech 3342 loudness range over short-term blocks
fn loudness_range(blocks: &[f64]) -> f64 {
    let absolute = lufs_to_power(ABSOLUTE_GATE);
    let above_abs: Vec<f64> = blocks.iter().copied().filter(|&p| p > absolute).collect();
    if above_abs.len() < 2 {
        return 0.0;
    }
    let mean = above_abs.iter().sum::<f64>() / above_abs.len() as f64;
    let gate = power_to_lufs(mean) + LRA_RELATIVE_GATE;

    let mut levels: Vec<f64> = above_abs
        .into_iter()
        .map(power_to_lufs)
        .filter(|&l| l > gate)
        .collect();
    if levels.len() < 2 {
        return 0.0;
    }
    levels.sort_by(f64::total_cmp);
    (percentile(&levels, 0.95) - percentile(&levels, 0.10)).max(0.0)
}

/// Linear-interpolated percentile of sorted values
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
