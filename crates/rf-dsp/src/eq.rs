//! Parametric EQ
//!
//! Bands are second-order cookbook sections applied one after another.
//! Every call filters the full buffer from zero filter state; no state is
//! carried between separate calls.

use rf_core::{AudioBuffer, RfError, RfResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::biquad::{BiquadCoeffs, BiquadTDF2, FilterType};

/// EQ band type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqBandType {
    /// Bell/peak filter
    Peak,
    /// Low shelf
    LowShelf,
    /// High shelf
    HighShelf,
    /// High cut
    Lowpass,
    /// Low cut
    Highpass,
}

impl EqBandType {
    fn filter_type(self) -> FilterType {
        match self {
            Self::Peak => FilterType::Peaking,
            Self::LowShelf => FilterType::LowShelf,
            Self::HighShelf => FilterType::HighShelf,
            Self::Lowpass => FilterType::Lowpass,
            Self::Highpass => FilterType::Highpass,
        }
    }
}

impl FromStr for EqBandType {
    type Err = RfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect();
        match key.as_str() {
            "peak" | "bell" | "peaking" => Ok(Self::Peak),
            "lowshelf" => Ok(Self::LowShelf),
            "highshelf" => Ok(Self::HighShelf),
            "lowpass" | "highcut" => Ok(Self::Lowpass),
            "highpass" | "lowcut" => Ok(Self::Highpass),
            _ => Err(RfError::InvalidBandType(s.to_string())),
        }
    }
}

/// Parametric EQ band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqBand {
    /// Center/corner frequency (Hz)
    pub freq: f64,
    /// Gain (dB); ignored by pass types
    pub gain_db: f64,
    /// Q factor
    pub q: f64,
    /// Band type
    pub band_type: EqBandType,
}

impl Default for EqBand {
    fn default() -> Self {
        Self {
            freq: 1000.0,
            gain_db: 0.0,
            q: std::f64::consts::FRAC_1_SQRT_2,
            band_type: EqBandType::Peak,
        }
    }
}

impl EqBand {
    pub fn peak(freq: f64, gain_db: f64, q: f64) -> Self {
        Self {
            freq,
            gain_db,
            q,
            band_type: EqBandType::Peak,
        }
    }

    pub fn low_shelf(freq: f64, gain_db: f64, q: f64) -> Self {
        Self {
            freq,
            gain_db,
            q,
            band_type: EqBandType::LowShelf,
        }
    }

    pub fn high_shelf(freq: f64, gain_db: f64, q: f64) -> Self {
        Self {
            freq,
            gain_db,
            q,
            band_type: EqBandType::HighShelf,
        }
    }

    pub fn lowpass(freq: f64, q: f64) -> Self {
        Self {
            freq,
            gain_db: 0.0,
            q,
            band_type: EqBandType::Lowpass,
        }
    }

    pub fn highpass(freq: f64, q: f64) -> Self {
        Self {
            freq,
            gain_db: 0.0,
            q,
            band_type: EqBandType::Highpass,
        }
    }

    /// Build a band from a loosely typed type name
    pub fn from_parts(band_type: &str, freq: f64, gain_db: f64, q: f64) -> RfResult<Self> {
        Ok(Self {
            freq,
            gain_db,
            q,
            band_type: band_type.parse()?,
        })
    }

    /// Coefficients for this band, validating frequency and Q
    pub fn coeffs(&self, sample_rate: f64) -> RfResult<BiquadCoeffs> {
        BiquadCoeffs::design(
            self.band_type.filter_type(),
            self.freq,
            self.q,
            self.gain_db,
            sample_rate,
        )
    }

    pub fn validate(&self, sample_rate: f64) -> RfResult<()> {
        self.coeffs(sample_rate).map(|_| ())
    }
}

/// Sequential parametric EQ
#[derive(Debug, Clone)]
pub struct ParametricEq {
    sample_rate: f64,
    bands: Vec<EqBand>,
}

impl ParametricEq {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            bands: Vec::new(),
        }
    }

    pub fn with_band(mut self, band: EqBand) -> Self {
        self.bands.push(band);
        self
    }

    pub fn with_bands(mut self, bands: &[EqBand]) -> Self {
        self.bands.extend_from_slice(bands);
        self
    }

    pub fn bands(&self) -> &[EqBand] {
        &self.bands
    }

    /// Run all bands in order
    pub fn process(&self, audio: &AudioBuffer) -> RfResult<AudioBuffer> {
        Self::apply_bands(audio, &self.bands, self.sample_rate)
    }

    /// Apply one band to every channel with identical coefficients
    pub fn apply(audio: &AudioBuffer, band: &EqBand, sample_rate: f64) -> RfResult<AudioBuffer> {
        let coeffs = band.coeffs(sample_rate)?;
        Ok(audio.map_channels(|ch| BiquadTDF2::filter_fresh(coeffs, ch)))
    }

    /// Apply bands sequentially; an empty list returns the input unchanged
    pub fn apply_bands(
        audio: &AudioBuffer,
        bands: &[EqBand],
        sample_rate: f64,
    ) -> RfResult<AudioBuffer> {
        // Validate everything up front so a bad band never leaves half-filtered audio
        for band in bands {
            band.validate(sample_rate)?;
        }
        let mut out = audio.clone();
        for band in bands {
            out = Self::apply(&out, band, sample_rate)?;
        }
        Ok(out)
    }
}
