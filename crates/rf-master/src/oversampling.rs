//! Windowed-sinc interpolation for true peak detection
//!
//! Phase 0 of every interpolator is the unit impulse, so the oversampled
//! signal passes exactly through the original samples and the true peak
//! is never below the sample peak.

use rf_core::{AudioBuffer, RfError, RfResult, Sample, linear_to_db};
use std::f64::consts::PI;

/// Oversampling factor used for dBTP measurement
pub const TRUE_PEAK_FACTOR: usize = 4;

/// Default half-width of the interpolation kernel, in input samples
pub const DEFAULT_HALF_TAPS: usize = 8;

/// Polyphase windowed-sinc interpolator
#[derive(Debug, Clone)]
pub struct Oversampler {
    factor: usize,
    half_taps: usize,
    /// `phases[p][k]` weights input sample `n + k - half_taps` for output `n + p/factor`
    phases: Vec<Vec<f64>>,
}

impl Default for Oversampler {
    fn default() -> Self {
        Self::build(TRUE_PEAK_FACTOR, DEFAULT_HALF_TAPS)
    }
}

impl Oversampler {
    pub fn new(factor: usize, half_taps: usize) -> RfResult<Self> {
        if !matches!(factor, 1 | 2 | 4 | 8 | 16) {
            return Err(RfError::InvalidParam(format!(
                "oversampling factor must be 1, 2, 4, 8 or 16, got {factor}"
            )));
        }
        if half_taps == 0 || half_taps > 64 {
            return Err(RfError::InvalidParam(format!(
                "interpolator half-width must be within 1..=64, got {half_taps}"
            )));
        }
        Ok(Self::build(factor, half_taps))
    }

    fn build(factor: usize, half_taps: usize) -> Self {
        let half = half_taps as f64;
        let phases = (0..factor)
            .map(|p| {
                let frac = p as f64 / factor as f64;
                let mut taps: Vec<f64> = (0..=2 * half_taps)
                    .map(|k| {
                        let t = frac - (k as f64 - half);
                        sinc(t) * blackman(t, half + 1.0)
                    })
                    .collect();
                // Unity DC gain per phase; phase 0 is already an impulse
                let sum: f64 = taps.iter().sum();
                if p > 0 && sum.abs() > 1e-12 {
                    taps.iter_mut().for_each(|c| *c /= sum);
                }
                taps
            })
            .collect();

        Self {
            factor,
            half_taps,
            phases,
        }
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Reconstructed value at `n + phase/factor`; samples outside the
    /// buffer count as silence
    #[inline]
    pub fn interpolate(&self, x: &[Sample], n: usize, phase: usize) -> Sample {
        if phase == 0 {
            return x.get(n).copied().unwrap_or(0.0);
        }
        let taps = &self.phases[phase];
        let start = n as isize - self.half_taps as isize;
        taps.iter()
            .enumerate()
            .filter_map(|(k, c)| {
                let idx = start + k as isize;
                (idx >= 0).then(|| x.get(idx as usize).map(|s| s * c)).flatten()
            })
            .sum()
    }

    /// Max abs of the reconstruction over `[n, n + 1)`
    #[inline]
    pub fn peak_at(&self, x: &[Sample], n: usize) -> Sample {
        (0..self.factor).fold(0.0, |acc: Sample, p| acc.max(self.interpolate(x, n, p).abs()))
    }

    /// Oversampled signal, `x.len() * factor` samples
    pub fn upsample(&self, x: &[Sample]) -> Vec<Sample> {
        let mut out = Vec::with_capacity(x.len() * self.factor);
        for n in 0..x.len() {
            for p in 0..self.factor {
                out.push(self.interpolate(x, n, p));
            }
        }
        out
    }

    /// Per-sample reconstructed peak, linked across channels.
    ///
    /// Entry `n` covers both intervals touching sample `n`, so a gain
    /// applied at `n` accounts for the overs on either side of it.
    pub fn linked_peaks(&self, audio: &AudioBuffer) -> Vec<Sample> {
        let len = audio.len();
        let mut interval: Vec<Sample> = vec![0.0; len];
        for ch in audio.channels() {
            for (n, slot) in interval.iter_mut().enumerate() {
                *slot = slot.max(self.peak_at(ch, n));
            }
        }
        (0..len)
            .map(|n| {
                let prev = if n > 0 { interval[n - 1] } else { 0.0 };
                interval[n].max(prev)
            })
            .collect()
    }

    /// Max abs reconstructed value of one channel
    pub fn channel_peak(&self, x: &[Sample]) -> Sample {
        (0..x.len()).fold(0.0, |acc: Sample, n| acc.max(self.peak_at(x, n)))
    }

    /// Max abs reconstructed value across channels
    pub fn buffer_peak(&self, audio: &AudioBuffer) -> Sample {
        audio
            .channels()
            .fold(0.0, |acc: Sample, ch| acc.max(self.channel_peak(ch)))
    }
}

#[inline]
fn sinc(t: f64) -> f64 {
    if t.abs() < 1e-12 {
        1.0
    } else {
        let x = PI * t;
        x.sin() / x
    }
}

/// Blackman window centred on 0 with half-width `half`
#[inline]
fn blackman(t: f64, half: f64) -> f64 {
    if t.abs() >= half {
        return 0.0;
    }
    let x = PI * t / half;
    0.42 + 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
}

/// Linear true peak at 4x
pub fn true_peak(audio: &AudioBuffer) -> Sample {
    Oversampler::default().buffer_peak(audio)
}

/// True peak in dBTP; `-inf` for an empty or silent buffer
pub fn true_peak_db(audio: &AudioBuffer) -> f64 {
    linear_to_db(true_peak(audio))
}
