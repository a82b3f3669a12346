//! Error types for the mix engine

use rf_core::RfError;
use thiserror::Error;

/// Mix configuration error.
///
/// Every variant is a caller mistake; nothing here is retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MixError {
    #[error("Unknown track preset: {0}")]
    UnknownPreset(String),

    #[error("Unknown genre: {0}")]
    UnknownGenre(String),

    #[error("Unknown track role: {0}")]
    UnknownRole(String),

    #[error("Unknown bus: {0}")]
    UnknownBus(String),

    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    #[error(transparent)]
    Dsp(#[from] RfError),
}

/// Result type alias
pub type MixResult<T> = Result<T, MixError>;
