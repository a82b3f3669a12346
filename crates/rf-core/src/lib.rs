//! rf-core: Shared types, traits, and utilities for ReelForge mixdown
//!
//! This crate provides the foundational types used across the mixdown crates:
//! the whole-buffer [`AudioBuffer`], decibel conversions, and the
//! configuration error type.

mod error;
mod sample;

pub use error::*;
pub use sample::*;

/// Floor used when a level would otherwise be `log10(0)`
pub const SILENCE_DB: f64 = -144.0;

/// Convert dB to linear gain
#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert linear gain to dB; non-positive gain maps to `-inf`
#[inline]
pub fn linear_to_db(gain: f64) -> f64 {
    if gain <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * gain.log10()
    }
}

/// Decibel value wrapper
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct Decibels(pub f64);

impl Decibels {
    pub const ZERO: Self = Self(0.0);
    pub const NEG_INF: Self = Self(f64::NEG_INFINITY);

    #[inline]
    pub fn from_gain(gain: f64) -> Self {
        Self(linear_to_db(gain))
    }

    #[inline]
    pub fn to_gain(self) -> f64 {
        if self.0 <= SILENCE_DB {
            0.0
        } else {
            db_to_linear(self.0)
        }
    }
}

impl Default for Decibels {
    fn default() -> Self {
        Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_db_conversions() {
        assert_relative_eq!(db_to_linear(0.0), 1.0);
        assert_relative_eq!(db_to_linear(-6.0), 0.501_187, epsilon = 1e-6);
        assert_relative_eq!(linear_to_db(0.5), -6.020_6, epsilon = 1e-4);
        assert_eq!(linear_to_db(0.0), f64::NEG_INFINITY);
    }

    #[test]
    fn test_decibels_roundtrip_floor() {
        assert_eq!(Decibels::NEG_INF.to_gain(), 0.0);
        assert_relative_eq!(Decibels::from_gain(2.0).to_gain(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_range_validation() {
        assert!(ensure_range("pan", 0.5, -1.0, 1.0).is_ok());
        assert!(ensure_range("pan", 1.5, -1.0, 1.0).is_err());
        assert!(ensure_positive("q", 0.0).is_err());
        assert!(ensure_finite("gain", f64::NAN).is_err());
    }
}
