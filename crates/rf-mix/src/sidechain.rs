//! Sidechain ducking between buses
//!
//! The trigger's peak envelope drives a dB-domain gain reduction, scaled by
//! `depth`, which is applied sample by sample to the target.

use rf_core::{AudioBuffer, RfResult, db_to_linear, ensure_positive, ensure_range, linear_to_db};
use rf_dsp::{EnvelopeFollower, gain_reduction_db};
use serde::{Deserialize, Serialize};

/// Trigger bus ducks target bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidechainRoute {
    pub trigger: String,
    pub target: String,
    #[serde(default = "defaults::threshold_db")]
    pub threshold_db: f64,
    #[serde(default = "defaults::ratio")]
    pub ratio: f64,
    #[serde(default = "defaults::attack_ms")]
    pub attack_ms: f64,
    #[serde(default = "defaults::release_ms")]
    pub release_ms: f64,
    /// Fraction of the computed reduction applied, `[0, 1]`
    #[serde(default = "defaults::depth")]
    pub depth: f64,
}

mod defaults {
    pub fn threshold_db() -> f64 {
        -30.0
    }
    pub fn ratio() -> f64 {
        4.0
    }
    pub fn attack_ms() -> f64 {
        1.0
    }
    pub fn release_ms() -> f64 {
        120.0
    }
    pub fn depth() -> f64 {
        0.8
    }
}

impl Default for SidechainRoute {
    fn default() -> Self {
        Self::new("kick", "bass")
    }
}

impl SidechainRoute {
    pub fn new(trigger: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            target: target.into(),
            threshold_db: defaults::threshold_db(),
            ratio: defaults::ratio(),
            attack_ms: defaults::attack_ms(),
            release_ms: defaults::release_ms(),
            depth: defaults::depth(),
        }
    }

    pub fn with_depth(mut self, depth: f64) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_threshold(mut self, threshold_db: f64) -> Self {
        self.threshold_db = threshold_db;
        self
    }

    pub fn validate(&self) -> RfResult<()> {
        ensure_range("sidechain threshold_db", self.threshold_db, -120.0, 0.0)?;
        ensure_range("sidechain ratio", self.ratio, 1.0, 100.0)?;
        ensure_positive("sidechain attack_ms", self.attack_ms)?;
        ensure_positive("sidechain release_ms", self.release_ms)?;
        ensure_range("sidechain depth", self.depth, 0.0, 1.0)
    }
}

/// Per-sample linear gain the trigger imposes on the target
pub fn duck_gain_curve(trigger: &AudioBuffer, route: &SidechainRoute, sample_rate: f64) -> Vec<f64> {
    let mut follower = EnvelopeFollower::new(route.attack_ms, route.release_ms, sample_rate);
    let depth = route.depth.clamp(0.0, 1.0);

    (0..trigger.len())
        .map(|i| {
            let level = trigger
                .channels()
                .fold(0.0_f64, |acc, ch| acc.max(ch[i].abs()));
            let env = follower.follow(level);
            let reduction = gain_reduction_db(linear_to_db(env), route.threshold_db, route.ratio, 0.0);
            db_to_linear(-reduction * depth)
        })
        .collect()
}

/// Apply a gain curve to `target`; samples past the curve are left alone
pub fn apply_sidechain(target: &mut AudioBuffer, curve: &[f64]) {
    for ch in target.channels_mut() {
        for (s, g) in ch.iter_mut().zip(curve) {
            *s *= g;
        }
    }
}
