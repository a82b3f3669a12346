//! Constant-power panning

use rf_core::AudioBuffer;
use std::f64::consts::{FRAC_PI_4, SQRT_2};

/// Left/right gains for `pan` in `[-1, 1]`.
///
/// cos/sin law scaled by √2, so centre is unity on both sides and a hard
/// pan puts √2 on one side.
pub fn constant_power_gains(pan: f64) -> (f64, f64) {
    let pan = if pan.is_finite() { pan.clamp(-1.0, 1.0) } else { 0.0 };
    let angle = (pan + 1.0) * FRAC_PI_4;
    (angle.cos() * SQRT_2, angle.sin() * SQRT_2)
}

/// Pan into a stereo buffer; mono sources are spread first
pub fn pan_stereo(audio: &AudioBuffer, pan: f64) -> AudioBuffer {
    let mut out = audio.to_stereo();
    if pan == 0.0 {
        return out;
    }
    let (left, right) = constant_power_gains(pan);
    for s in out.channel_mut(0).iter_mut() {
        *s *= left;
    }
    for s in out.channel_mut(1).iter_mut() {
        *s *= right;
    }
    out
}
