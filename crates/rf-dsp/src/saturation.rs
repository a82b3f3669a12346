//! Saturation and safety clipping
//!
//! The saturator is a static tanh waveshaper normalized so full scale maps
//! back to full scale; it carries no state.

use rf_core::{AudioBuffer, RfResult, Sample, ensure_range};
use serde::{Deserialize, Serialize};

/// Default ceiling for the safety soft clip
pub const SAFETY_CEILING: f64 = 0.99;

/// Smooth clip toward `±ceiling`
#[inline]
pub fn soft_clip(x: Sample, ceiling: f64) -> Sample {
    ceiling * (x / ceiling).tanh()
}

/// Soft clip a buffer only when its sample peak exceeds `ceiling`.
///
/// Returns whether clipping was applied.
pub fn soft_clip_if_hot(audio: &mut AudioBuffer, ceiling: f64) -> bool {
    if audio.peak() <= ceiling {
        return false;
    }
    for ch in audio.channels_mut() {
        for s in ch.iter_mut() {
            *s = soft_clip(*s, ceiling);
        }
    }
    true
}

/// tanh saturator with drive-dependent gain compensation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Saturator {
    /// Input drive, 1.0 = bypass
    pub drive: f64,
}

impl Default for Saturator {
    fn default() -> Self {
        Self { drive: 1.0 }
    }
}

impl Saturator {
    pub fn new(drive: f64) -> RfResult<Self> {
        let sat = Self { drive };
        sat.validate()?;
        Ok(sat)
    }

    pub fn validate(&self) -> RfResult<()> {
        ensure_range("drive", self.drive, 0.0, 100.0)
    }

    /// Drive at or below 1 leaves the signal untouched
    pub fn is_bypassed(&self) -> bool {
        self.drive <= 1.0
    }

    #[inline]
    pub fn process_sample(&self, x: Sample) -> Sample {
        if self.is_bypassed() {
            return x;
        }
        (self.drive * x).tanh() / self.drive.tanh()
    }

    pub fn process(&self, audio: &AudioBuffer) -> AudioBuffer {
        if self.is_bypassed() {
            return audio.clone();
        }
        audio.map_channels(|ch| ch.iter().map(|&x| self.process_sample(x)).collect())
    }
}
