//! Envelope followers and gain smoothing
//!
//! All followers here are causal one-sample recurrences that start from a
//! zero state, so output sample `i` depends only on inputs `0..=i`.

use rf_core::Sample;

use crate::{MonoProcessor, Processor};

/// One-pole smoothing coefficient for a time constant in milliseconds.
///
/// Non-positive times give `0.0` (instant response).
#[inline]
pub fn time_constant_coeff(time_ms: f64, sample_rate: f64) -> f64 {
    let samples = time_ms * 0.001 * sample_rate;
    if samples.is_finite() && samples > 0.0 {
        (-1.0 / samples).exp()
    } else {
        0.0
    }
}

/// Peak envelope follower with separate attack and release
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    attack_coeff: f64,
    release_coeff: f64,
    envelope: f64,
}

impl EnvelopeFollower {
    pub fn new(attack_ms: f64, release_ms: f64, sample_rate: f64) -> Self {
        Self {
            attack_coeff: time_constant_coeff(attack_ms, sample_rate),
            release_coeff: time_constant_coeff(release_ms, sample_rate),
            envelope: 0.0,
        }
    }

    /// Follow an already-rectified level
    #[inline(always)]
    pub fn follow(&mut self, level: f64) -> f64 {
        let coeff = if level > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = level + coeff * (self.envelope - level);
        self.envelope
    }

    pub fn current(&self) -> f64 {
        self.envelope
    }
}

impl Processor for EnvelopeFollower {
    fn reset(&mut self) {
        self.envelope = 0.0;
    }
}

impl MonoProcessor for EnvelopeFollower {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        self.follow(input.abs())
    }
}

/// Symmetric one-pole lowpass on a level signal
#[derive(Debug, Clone)]
pub struct OnePole {
    coeff: f64,
    state: f64,
}

impl OnePole {
    pub fn new(time_ms: f64, sample_rate: f64) -> Self {
        Self {
            coeff: time_constant_coeff(time_ms, sample_rate),
            state: 0.0,
        }
    }

    #[inline(always)]
    pub fn process(&mut self, input: f64) -> f64 {
        self.state = input + self.coeff * (self.state - input);
        self.state
    }
}

impl Processor for OnePole {
    fn reset(&mut self) {
        self.state = 0.0;
    }
}

/// Causal sliding-window mean-square detector.
///
/// The window starts filled with silence, so the first `window` outputs
/// ramp up rather than over-reading a partial window.
#[derive(Debug, Clone)]
pub struct RmsDetector {
    history: Vec<f64>,
    pos: usize,
    sum: f64,
}

impl RmsDetector {
    /// Default detector window used by the compressors
    pub const DEFAULT_WINDOW_MS: f64 = 10.0;

    pub fn new(window_ms: f64, sample_rate: f64) -> Self {
        let window = ((window_ms * 0.001 * sample_rate).round() as usize).max(1);
        Self {
            history: vec![0.0; window],
            pos: 0,
            sum: 0.0,
        }
    }

    pub fn window_len(&self) -> usize {
        self.history.len()
    }

    /// Push a squared sample, return the windowed mean square
    #[inline]
    pub fn push(&mut self, square: f64) -> f64 {
        self.sum += square - self.history[self.pos];
        self.history[self.pos] = square;
        self.pos = (self.pos + 1) % self.history.len();
        // Running sums drift slightly negative on silence
        (self.sum / self.history.len() as f64).max(0.0)
    }
}

impl Processor for RmsDetector {
    fn reset(&mut self) {
        self.history.fill(0.0);
        self.pos = 0;
        self.sum = 0.0;
    }
}

/// Attack/release smoothing of a gain-reduction trajectory in dB.
///
/// Rising reduction uses the attack constant, falling reduction the release.
#[derive(Debug, Clone)]
pub struct GainSmoother {
    attack_coeff: f64,
    release_coeff: f64,
    current_db: f64,
}

impl GainSmoother {
    pub fn new(attack_ms: f64, release_ms: f64, sample_rate: f64) -> Self {
        Self {
            attack_coeff: time_constant_coeff(attack_ms, sample_rate),
            release_coeff: time_constant_coeff(release_ms, sample_rate),
            current_db: 0.0,
        }
    }

    #[inline(always)]
    pub fn process(&mut self, target_reduction_db: f64) -> f64 {
        let coeff = if target_reduction_db > self.current_db {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.current_db = target_reduction_db + coeff * (self.current_db - target_reduction_db);
        self.current_db
    }

    pub fn current_db(&self) -> f64 {
        self.current_db
    }
}

impl Processor for GainSmoother {
    fn reset(&mut self) {
        self.current_db = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SR: f64 = 48000.0;

    #[test]
    fn test_time_constant() {
        let coeff = time_constant_coeff(10.0, SR);
        assert_relative_eq!(coeff, (-1.0f64 / 480.0).exp());
        assert_eq!(time_constant_coeff(0.0, SR), 0.0);
    }

    #[test]
    fn test_follower_attack_faster_than_release() {
        let mut env = EnvelopeFollower::new(1.0, 100.0, SR);
        for _ in 0..480 {
            env.process_sample(1.0);
        }
        assert!(env.current() > 0.99);

        for _ in 0..480 {
            env.process_sample(0.0);
        }
        // 10 ms into a 100 ms release
        assert!(env.current() > 0.85);
    }

    #[test]
    fn test_rms_detector_steady_state() {
        let mut det = RmsDetector::new(10.0, SR);
        assert_eq!(det.window_len(), 480);

        let mut ms = 0.0;
        for i in 0..4800 {
            let x = (2.0 * std::f64::consts::PI * 1000.0 * i as f64 / SR).sin();
            ms = det.push(x * x);
        }
        assert_relative_eq!(ms, 0.5, epsilon = 1e-3);
    }

    #[test]
    fn test_rms_detector_starts_from_silence() {
        let mut det = RmsDetector::new(10.0, SR);
        let first = det.push(1.0);
        assert_relative_eq!(first, 1.0 / 480.0);
    }

    #[test]
    fn test_gain_smoother_converges() {
        let mut smoother = GainSmoother::new(5.0, 50.0, SR);
        let mut gr = 0.0;
        for _ in 0..SR as usize {
            gr = smoother.process(6.0);
        }
        assert_relative_eq!(gr, 6.0, epsilon = 1e-6);

        smoother.reset();
        assert_eq!(smoother.current_db(), 0.0);
    }
}
