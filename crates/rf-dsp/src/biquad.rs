//! Biquad filter implementation using Transposed Direct Form II
//!
//! TDF-II keeps only two state variables per stage and behaves well in
//! floating point. Coefficients follow the RBJ audio EQ cookbook.

use rf_core::{RfError, RfResult, Sample};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::{MonoProcessor, Processor};

/// Biquad filter types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterType {
    Lowpass,
    Highpass,
    Peaking,
    LowShelf,
    HighShelf,
}

/// Normalized biquad coefficients (a0 folded in)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::bypass()
    }
}

/// Shared cookbook intermediates
struct Prewarp {
    cos_omega: f64,
    alpha: f64,
}

impl Prewarp {
    fn new(freq: f64, q: f64, sample_rate: f64) -> Self {
        let omega = 2.0 * PI * freq / sample_rate;
        Self {
            cos_omega: omega.cos(),
            alpha: omega.sin() / (2.0 * q),
        }
    }
}

impl BiquadCoeffs {
    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Validate parameters and build coefficients for `filter_type`.
    ///
    /// `gain_db` is ignored by the pass types.
    pub fn design(
        filter_type: FilterType,
        freq: f64,
        q: f64,
        gain_db: f64,
        sample_rate: f64,
    ) -> RfResult<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(RfError::InvalidParam(format!(
                "sample rate must be > 0, got {sample_rate}"
            )));
        }
        let nyquist = sample_rate / 2.0;
        if !(freq.is_finite() && freq > 0.0 && freq < nyquist) {
            return Err(RfError::InvalidFrequency { freq, nyquist });
        }
        if !(q.is_finite() && q > 0.0) {
            return Err(RfError::InvalidQ(q));
        }
        if !gain_db.is_finite() {
            return Err(RfError::InvalidParam(format!(
                "filter gain must be finite, got {gain_db}"
            )));
        }

        Ok(match filter_type {
            FilterType::Lowpass => Self::lowpass(freq, q, sample_rate),
            FilterType::Highpass => Self::highpass(freq, q, sample_rate),
            FilterType::Peaking => Self::peaking(freq, q, gain_db, sample_rate),
            FilterType::LowShelf => Self::low_shelf(freq, q, gain_db, sample_rate),
            FilterType::HighShelf => Self::high_shelf(freq, q, gain_db, sample_rate),
        })
    }

    /// Calculate lowpass filter coefficients
    pub fn lowpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let Prewarp { cos_omega, alpha } = Prewarp::new(freq, q, sample_rate);
        Self::normalized(
            (1.0 - cos_omega) / 2.0,
            1.0 - cos_omega,
            (1.0 - cos_omega) / 2.0,
            1.0 + alpha,
            -2.0 * cos_omega,
            1.0 - alpha,
        )
    }

    /// Calculate highpass filter coefficients
    pub fn highpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let Prewarp { cos_omega, alpha } = Prewarp::new(freq, q, sample_rate);
        Self::normalized(
            (1.0 + cos_omega) / 2.0,
            -(1.0 + cos_omega),
            (1.0 + cos_omega) / 2.0,
            1.0 + alpha,
            -2.0 * cos_omega,
            1.0 - alpha,
        )
    }

    /// Calculate peaking EQ filter coefficients
    pub fn peaking(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let Prewarp { cos_omega, alpha } = Prewarp::new(freq, q, sample_rate);
        Self::normalized(
            1.0 + alpha * a,
            -2.0 * cos_omega,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_omega,
            1.0 - alpha / a,
        )
    }

    /// Calculate low shelf filter coefficients
    pub fn low_shelf(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let Prewarp { cos_omega, alpha } = Prewarp::new(freq, q, sample_rate);
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        Self::normalized(
            a * ((a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha),
            2.0 * a * ((a - 1.0) - (a + 1.0) * cos_omega),
            a * ((a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha),
            (a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha,
            -2.0 * ((a - 1.0) + (a + 1.0) * cos_omega),
            (a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha,
        )
    }

    /// Calculate high shelf filter coefficients
    pub fn high_shelf(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let Prewarp { cos_omega, alpha } = Prewarp::new(freq, q, sample_rate);
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        Self::normalized(
            a * ((a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_omega),
            a * ((a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha),
            (a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha,
            2.0 * ((a - 1.0) - (a + 1.0) * cos_omega),
            (a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha,
        )
    }

    /// Bypass (unity gain, no filtering)
    pub fn bypass() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Magnitude response in dB at `freq`
    pub fn magnitude_db(&self, freq: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * freq / sample_rate;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());

        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);

        let num = num_re * num_re + num_im * num_im;
        let den = (den_re * den_re + den_im * den_im).max(1e-300);
        10.0 * (num / den).max(1e-300).log10()
    }
}

/// Transposed Direct Form II biquad filter
#[derive(Debug, Clone)]
pub struct BiquadTDF2 {
    coeffs: BiquadCoeffs,
    z1: f64,
    z2: f64,
}

impl BiquadTDF2 {
    /// New filter with zeroed state
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            z1: 0.0,
            z2: 0.0,
        }
    }

    #[inline]
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    #[inline]
    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    /// Filter a whole channel starting from zero state
    pub fn filter_fresh(coeffs: BiquadCoeffs, input: &[Sample]) -> Vec<Sample> {
        let mut filter = Self::new(coeffs);
        let mut out = input.to_vec();
        filter.process_block(&mut out);
        out
    }
}

impl Processor for BiquadTDF2 {
    fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

impl MonoProcessor for BiquadTDF2 {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let output = self.coeffs.b0 * input + self.z1;
        self.z1 = self.coeffs.b1 * input - self.coeffs.a1 * output + self.z2;
        self.z2 = self.coeffs.b2 * input - self.coeffs.a2 * output;
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const SR: f64 = 48000.0;

    #[test]
    fn test_bypass() {
        let mut filter = BiquadTDF2::new(BiquadCoeffs::bypass());
        let output = filter.process_sample(0.5);
        assert!((output - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_lowpass_dc() {
        let mut filter = BiquadTDF2::new(BiquadCoeffs::lowpass(1000.0, 0.707, SR));

        for _ in 0..1000 {
            filter.process_sample(1.0);
        }
        let output = filter.process_sample(1.0);
        assert!((output - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_highpass_dc() {
        let mut filter = BiquadTDF2::new(BiquadCoeffs::highpass(1000.0, 0.707, SR));

        for _ in 0..1000 {
            filter.process_sample(1.0);
        }
        let output = filter.process_sample(1.0);
        assert!(output.abs() < 0.01);
    }

    #[test]
    fn test_reset() {
        let mut filter = BiquadTDF2::new(BiquadCoeffs::lowpass(1000.0, 0.707, SR));
        for _ in 0..100 {
            filter.process_sample(1.0);
        }

        filter.reset();

        assert_eq!(filter.z1, 0.0);
        assert_eq!(filter.z2, 0.0);
    }

    #[test]
    fn test_peaking_gain_at_center() {
        let coeffs = BiquadCoeffs::peaking(1000.0, 1.0, 6.0, SR);
        assert_abs_diff_eq!(coeffs.magnitude_db(1000.0, SR), 6.0, epsilon = 1e-6);
        assert_abs_diff_eq!(coeffs.magnitude_db(20.0, SR), 0.0, epsilon = 0.05);
    }

    #[test]
    fn test_shelf_asymptotes() {
        let low = BiquadCoeffs::low_shelf(200.0, 0.707, -9.0, SR);
        assert_abs_diff_eq!(low.magnitude_db(10.0, SR), -9.0, epsilon = 0.1);
        assert_abs_diff_eq!(low.magnitude_db(15000.0, SR), 0.0, epsilon = 0.1);

        let high = BiquadCoeffs::high_shelf(2000.0, 0.707, 4.0, SR);
        assert_abs_diff_eq!(high.magnitude_db(20000.0, SR), 4.0, epsilon = 0.1);
        assert_abs_diff_eq!(high.magnitude_db(50.0, SR), 0.0, epsilon = 0.05);
    }

    #[test]
    fn test_design_rejects_out_of_range() {
        assert!(matches!(
            BiquadCoeffs::design(FilterType::Lowpass, 0.0, 0.7, 0.0, SR),
            Err(RfError::InvalidFrequency { .. })
        ));
        assert!(matches!(
            BiquadCoeffs::design(FilterType::Lowpass, 24000.0, 0.7, 0.0, SR),
            Err(RfError::InvalidFrequency { .. })
        ));
        assert!(matches!(
            BiquadCoeffs::design(FilterType::Peaking, 1000.0, 0.0, 3.0, SR),
            Err(RfError::InvalidQ(_))
        ));
        assert!(BiquadCoeffs::design(FilterType::HighShelf, 5000.0, 0.7, 3.0, SR).is_ok());
    }
}
