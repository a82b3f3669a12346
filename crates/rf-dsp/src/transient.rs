//! Transient shaper
//!
//! A fast and a slow follower track the same rectified, channel-linked
//! signal. Their positive difference marks attacks, the slow envelope
//! marks sustain; each is normalized to its own peak and weighted by the
//! attack/sustain amounts.

use rf_core::{AudioBuffer, RfResult, Sample, ensure_range};
use serde::{Deserialize, Serialize};

use crate::Processor;
use crate::envelope::OnePole;

/// Fast follower time constant (ms)
pub const FAST_MS: f64 = 1.0;
/// Slow follower time constant (ms)
pub const SLOW_MS: f64 = 50.0;
/// Lowest gain the shaper will apply
pub const GAIN_FLOOR: f64 = 0.5;

/// Transient shaper amounts, both in `[-100, 100]` percent
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransientConfig {
    pub attack_pct: f64,
    pub sustain_pct: f64,
}

impl TransientConfig {
    pub fn new(attack_pct: f64, sustain_pct: f64) -> Self {
        Self {
            attack_pct,
            sustain_pct,
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.attack_pct == 0.0 && self.sustain_pct == 0.0
    }

    pub fn validate(&self) -> RfResult<()> {
        ensure_range("attack_pct", self.attack_pct, -100.0, 100.0)?;
        ensure_range("sustain_pct", self.sustain_pct, -100.0, 100.0)
    }

    /// `[-100, 100]` percent to a `[0, 2]` multiplier
    #[inline]
    fn multiplier(pct: f64) -> f64 {
        1.0 + pct / 100.0
    }
}

/// Differential-envelope transient shaper
#[derive(Debug, Clone)]
pub struct TransientShaper {
    config: TransientConfig,
    fast: OnePole,
    slow: OnePole,
}

impl TransientShaper {
    pub fn new(config: TransientConfig, sample_rate: f64) -> RfResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            fast: OnePole::new(FAST_MS, sample_rate),
            slow: OnePole::new(SLOW_MS, sample_rate),
        })
    }

    pub fn config(&self) -> &TransientConfig {
        &self.config
    }

    /// Per-frame gain for a buffer
    pub fn gain_curve(&mut self, audio: &AudioBuffer) -> Vec<f64> {
        self.reset();
        let len = audio.len();
        let mut transient = Vec::with_capacity(len);
        let mut sustain = Vec::with_capacity(len);

        for i in 0..len {
            let level = audio.channels().fold(0.0, |acc: Sample, ch| acc.max(ch[i].abs()));
            let fast = self.fast.process(level);
            let slow = self.slow.process(level);
            transient.push((fast - slow).max(0.0));
            sustain.push(slow);
        }

        normalize_to_peak(&mut transient);
        normalize_to_peak(&mut sustain);

        let attack = TransientConfig::multiplier(self.config.attack_pct);
        let sustain_mult = TransientConfig::multiplier(self.config.sustain_pct);

        transient
            .iter()
            .zip(&sustain)
            .map(|(t, s)| {
                let g_attack = 1.0 + (attack - 1.0) * t;
                let g_sustain = 1.0 + (sustain_mult - 1.0) * s;
                (0.5 * (g_attack + g_sustain)).max(GAIN_FLOOR)
            })
            .collect()
    }

    pub fn process(&mut self, audio: &AudioBuffer) -> AudioBuffer {
        if self.config.is_neutral() {
            return audio.clone();
        }
        let curve = self.gain_curve(audio);
        let mut out = audio.clone();
        for ch in out.channels_mut() {
            for (s, g) in ch.iter_mut().zip(&curve) {
                *s *= g;
            }
        }
        out
    }
}

impl Processor for TransientShaper {
    fn reset(&mut self) {
        self.fast.reset();
        self.slow.reset();
    }
}

/// Scale so the maximum is 1; an all-zero curve stays zero
fn normalize_to_peak(values: &mut [f64]) {
    let peak = values.iter().fold(0.0_f64, |acc, v| acc.max(*v));
    if peak > 1e-12 {
        let scale = 1.0 / peak;
        values.iter_mut().for_each(|v| *v *= scale);
    } else {
        values.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 48000.0;

    /// Repeating decaying bursts, like a simple drum loop
    fn hits(len: usize, period: usize) -> Vec<f64> {
        (0..len)
            .map(|i| {
                let n = (i % period) as f64;
                let env = (-n / (0.03 * SR)).exp();
                env * (2.0 * std::f64::consts::PI * 180.0 * i as f64 / SR).sin() * 0.8
            })
            .collect()
    }

    #[test]
    fn test_neutral_is_identity() {
        let audio = AudioBuffer::mono(hits(9600, 4800));
        let mut shaper = TransientShaper::new(TransientConfig::default(), SR).unwrap();
        assert_eq!(shaper.process(&audio), audio);
    }

    #[test]
    fn test_attack_boost_peaks_near_onsets() {
        let audio = AudioBuffer::mono(hits(48000, 12000));
        let mut shaper = TransientShaper::new(TransientConfig::new(100.0, 0.0), SR).unwrap();
        let curve = shaper.gain_curve(&audio);

        let (argmax, max) = curve
            .iter()
            .enumerate()
            .fold((0, 0.0), |acc, (i, &g)| if g > acc.1 { (i, g) } else { acc });
        assert!(max > 1.4);
        assert!(argmax % 12000 < 480, "max gain at {argmax}");
        // Late in each hit the transient signal is gone
        assert!(curve[11000] < 1.05);
    }

    #[test]
    fn test_negative_sustain_reduces_body() {
        let audio = AudioBuffer::mono(hits(48000, 12000));
        let mut shaper = TransientShaper::new(TransientConfig::new(0.0, -80.0), SR).unwrap();
        let out = shaper.process(&audio);
        assert!(out.rms() < audio.rms());
    }

    #[test]
    fn test_gain_floor() {
        let audio = AudioBuffer::stereo(hits(24000, 6000), hits(24000, 8000));
        let mut shaper = TransientShaper::new(TransientConfig::new(-100.0, -100.0), SR).unwrap();
        let curve = shaper.gain_curve(&audio);
        assert!(curve.iter().all(|&g| g >= GAIN_FLOOR));
        assert!(curve.iter().any(|&g| g == GAIN_FLOOR));
    }

    #[test]
    fn test_silence_is_finite() {
        let audio = AudioBuffer::mono(vec![0.0; 1000]);
        let mut shaper = TransientShaper::new(TransientConfig::new(50.0, 50.0), SR).unwrap();
        let out = shaper.process(&audio);
        assert!(out.is_finite());
        assert_eq!(out.peak(), 0.0);
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(TransientShaper::new(TransientConfig::new(150.0, 0.0), SR).is_err());
        assert!(TransientConfig::new(0.0, -101.0).validate().is_err());
    }
}
