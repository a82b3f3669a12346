//! rf-master: Mastering stage for ReelForge mixdown
//!
//! ## Features
//! - **True Peak**: 4x windowed-sinc reconstruction for dBTP measurement
//! - **Loudness**: BS.1770 K-weighted integrated, momentary, short-term and range
//! - **Normalization**: single-gain loudness targeting
//! - **Limiting**: oversampled true peak limiter and sample-peak brickwall
//! - **Master Chain**: EQ → compression → limiting → normalization
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rf_master::{MasterChain, MasterConfig};
//!
//! let mut chain = MasterChain::new(MasterConfig::default().with_target(-14.0), 48000.0)?;
//! let mastered = chain.process(&mix)?;
//! println!("{:.1} LUFS", mastered.loudness.integrated_lufs);
//! ```

// Mastering algorithms use explicit indexing
#![allow(clippy::needless_range_loop)]

pub mod chain;
pub mod limiter;
pub mod loudness;
pub mod normalize;
pub mod oversampling;

pub use chain::{MasterChain, MasterConfig, MasterOutput};
pub use limiter::{BrickwallLimiter, Limiter, LimiterConfig, LimiterMode, TruePeakLimiter};
pub use loudness::{
    KWeightingFilter, LUFS_FLOOR, LoudnessMeasurement, LoudnessMeter, SILENCE_POWER,
};
pub use normalize::{LoudnessNormalizer, Normalized, normalize_to_lufs};
pub use oversampling::{Oversampler, true_peak, true_peak_db};
