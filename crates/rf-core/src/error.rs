//! Error types for ReelForge mixdown

use thiserror::Error;

/// Configuration error raised by DSP stages.
///
/// Numeric edge cases (silence, empty buffers) never produce an error;
/// only invalid configuration does.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RfError {
    #[error("Invalid EQ band type: {0}")]
    InvalidBandType(String),

    #[error("Invalid filter frequency: {freq} Hz (must be between 0 and {nyquist} Hz)")]
    InvalidFrequency { freq: f64, nyquist: f64 },

    #[error("Invalid filter Q: {0} (must be > 0)")]
    InvalidQ(f64),

    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Channel mismatch: expected {expected}, got {got}")]
    ChannelMismatch { expected: usize, got: usize },
}

/// Result type alias
pub type RfResult<T> = Result<T, RfError>;

/// Reject non-finite values with a named parameter error
pub fn ensure_finite(name: &str, value: f64) -> RfResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(RfError::InvalidParam(format!("{name} must be finite, got {value}")))
    }
}

/// Reject values that are not strictly positive (or not finite)
pub fn ensure_positive(name: &str, value: f64) -> RfResult<()> {
    ensure_finite(name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(RfError::InvalidParam(format!("{name} must be > 0, got {value}")))
    }
}

/// Reject values outside `[min, max]`
pub fn ensure_range(name: &str, value: f64, min: f64, max: f64) -> RfResult<()> {
    ensure_finite(name, value)?;
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(RfError::InvalidParam(format!(
            "{name} must be within [{min}, {max}], got {value}"
        )))
    }
}
