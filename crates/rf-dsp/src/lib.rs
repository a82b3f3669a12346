//! rf-dsp: DSP processors for ReelForge mixdown
//!
//! Offline, whole-buffer processing. Every stateful recurrence lives in an
//! explicit state struct that starts from zero on each call.
//!
//! ## Modules
//! - `biquad` - TDF-II biquad filters (lowpass, highpass, peaking, shelving)
//! - `eq` - Parametric EQ bands applied sequentially
//! - `envelope` - Envelope followers, RMS detector, gain smoothing
//! - `dynamics` - Compressor with soft knee and optional upward expander
//! - `multiband` - Linkwitz-Riley band splitting and per-band dynamics
//! - `transient` - Differential envelope transient shaper
//! - `saturation` - tanh waveshaper and safety soft clip

pub mod biquad;
pub mod dynamics;
pub mod envelope;
pub mod eq;
pub mod multiband;
pub mod saturation;
pub mod transient;

use rf_core::Sample;

pub use biquad::{BiquadCoeffs, BiquadTDF2, FilterType};
pub use dynamics::{Compressor, CompressorConfig, ExpanderConfig, gain_reduction_db};
pub use eq::{EqBand, EqBandType, ParametricEq};
pub use envelope::{EnvelopeFollower, GainSmoother, OnePole, RmsDetector, time_constant_coeff};
pub use multiband::{BandDynamics, LinkwitzRiley, MultibandConfig, MultibandDynamics};
pub use saturation::{SAFETY_CEILING, Saturator, soft_clip, soft_clip_if_hot};
pub use transient::{TransientConfig, TransientShaper};

/// Trait for all stateful DSP processors
pub trait Processor {
    /// Reset processor state
    fn reset(&mut self);
}

/// Mono processor trait
pub trait MonoProcessor: Processor {
    /// Process a single sample
    fn process_sample(&mut self, input: Sample) -> Sample;

    /// Process a block of samples in place
    fn process_block(&mut self, buffer: &mut [Sample]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }
}
