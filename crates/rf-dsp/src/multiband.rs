//! Multi-band Dynamics Processing
//!
//! - Linkwitz-Riley 24 dB/oct crossovers (two cascaded Butterworth sections)
//! - Per-band compressor, optional upward expander and trim
//!
//! Each crossover takes the LR4 lowpass of the remaining signal as the lower
//! band and the complementary residual as the upper one, so the unprocessed
//! bands always sum back to the input.

use rf_core::{AudioBuffer, RfError, RfResult, Sample, db_to_linear, ensure_range};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_1_SQRT_2;

use crate::biquad::{BiquadCoeffs, BiquadTDF2, FilterType};
use crate::dynamics::{Compressor, CompressorConfig, ExpanderConfig};
use crate::{MonoProcessor, Processor};

/// Maximum bands
pub const MAX_BANDS: usize = 6;

// ============ Linkwitz-Riley Filter ============

/// LR4 crossover: Butterworth lowpass squared
#[derive(Debug, Clone)]
pub struct LinkwitzRiley {
    freq: f64,
    stages: [BiquadTDF2; 2],
}

impl LinkwitzRiley {
    pub fn new(freq: f64, sample_rate: f64) -> RfResult<Self> {
        let coeffs =
            BiquadCoeffs::design(FilterType::Lowpass, freq, FRAC_1_SQRT_2, 0.0, sample_rate)?;
        Ok(Self {
            freq,
            stages: [BiquadTDF2::new(coeffs), BiquadTDF2::new(coeffs)],
        })
    }

    pub fn freq(&self) -> f64 {
        self.freq
    }

    /// Lowpass a whole channel from zero state
    pub fn lowpass(&mut self, input: &[Sample]) -> Vec<Sample> {
        self.reset();
        input
            .iter()
            .map(|&x| {
                let y = self.stages[0].process_sample(x);
                self.stages[1].process_sample(y)
            })
            .collect()
    }

    /// `(low, high)` with `low + high == input`
    pub fn split(&mut self, input: &[Sample]) -> (Vec<Sample>, Vec<Sample>) {
        let low = self.lowpass(input);
        let high = input.iter().zip(&low).map(|(x, l)| x - l).collect();
        (low, high)
    }
}

impl Processor for LinkwitzRiley {
    fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }
}

// ============ Configuration ============

/// Dynamics for one band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandDynamics {
    pub compressor: CompressorConfig,
    pub expander: Option<ExpanderConfig>,
    /// Band trim after dynamics (dB)
    pub gain_db: f64,
}

impl Default for BandDynamics {
    fn default() -> Self {
        Self {
            compressor: CompressorConfig::unity(),
            expander: None,
            gain_db: 0.0,
        }
    }
}

impl BandDynamics {
    pub fn compress(compressor: CompressorConfig) -> Self {
        Self {
            compressor,
            ..Self::default()
        }
    }

    pub fn with_expander(mut self, expander: ExpanderConfig) -> Self {
        self.expander = Some(expander);
        self
    }

    pub fn with_gain(mut self, gain_db: f64) -> Self {
        self.gain_db = gain_db;
        self
    }

    pub fn validate(&self) -> RfResult<()> {
        self.compressor.validate()?;
        if let Some(expander) = &self.expander {
            expander.validate()?;
        }
        ensure_range("band gain_db", self.gain_db, -48.0, 24.0)
    }

    fn is_neutral(&self) -> bool {
        self.compressor.ratio <= 1.0
            && self.compressor.makeup_db == 0.0
            && self.expander.is_none()
            && self.gain_db == 0.0
    }
}

/// Crossover frequencies plus one [`BandDynamics`] per band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultibandConfig {
    /// Ascending crossover frequencies (Hz)
    pub crossovers: Vec<f64>,
    /// Bands, low to high; `crossovers.len() + 1` entries
    pub bands: Vec<BandDynamics>,
}

impl Default for MultibandConfig {
    fn default() -> Self {
        Self::mastering()
    }
}

impl MultibandConfig {
    /// Unity dynamics on every band
    pub fn neutral(crossovers: Vec<f64>) -> Self {
        let bands = vec![BandDynamics::default(); crossovers.len() + 1];
        Self { crossovers, bands }
    }

    /// Four-band glue compression
    pub fn mastering() -> Self {
        let band = |threshold_db, ratio, attack_ms, release_ms| {
            BandDynamics::compress(CompressorConfig::new(threshold_db, ratio, attack_ms, release_ms))
        };
        Self {
            crossovers: vec![120.0, 1000.0, 5000.0],
            bands: vec![
                band(-18.0, 2.5, 20.0, 150.0),
                band(-16.0, 2.0, 15.0, 120.0),
                band(-14.0, 2.0, 10.0, 100.0),
                band(-12.0, 1.8, 5.0, 80.0),
            ],
        }
    }

    pub fn num_bands(&self) -> usize {
        self.bands.len()
    }

    pub fn validate(&self, sample_rate: f64) -> RfResult<()> {
        if self.bands.len() != self.crossovers.len() + 1 {
            return Err(RfError::InvalidParam(format!(
                "multiband needs {} bands for {} crossovers, got {}",
                self.crossovers.len() + 1,
                self.crossovers.len(),
                self.bands.len()
            )));
        }
        if self.bands.len() > MAX_BANDS {
            return Err(RfError::InvalidParam(format!(
                "at most {MAX_BANDS} bands supported, got {}",
                self.bands.len()
            )));
        }
        let nyquist = sample_rate / 2.0;
        for &freq in &self.crossovers {
            if !(freq.is_finite() && freq > 0.0 && freq < nyquist) {
                return Err(RfError::InvalidFrequency { freq, nyquist });
            }
        }
        if self.crossovers.windows(2).any(|w| w[1] <= w[0]) {
            return Err(RfError::InvalidParam(format!(
                "crossovers must be strictly ascending: {:?}",
                self.crossovers
            )));
        }
        self.bands.iter().try_for_each(BandDynamics::validate)
    }
}

// ============ Processor ============

/// Band splitter plus per-band dynamics
#[derive(Debug, Clone)]
pub struct MultibandDynamics {
    config: MultibandConfig,
    crossovers: Vec<LinkwitzRiley>,
    compressors: Vec<Compressor>,
    band_reduction_db: Vec<f64>,
}

impl MultibandDynamics {
    pub fn new(config: MultibandConfig, sample_rate: f64) -> RfResult<Self> {
        config.validate(sample_rate)?;
        let crossovers = config
            .crossovers
            .iter()
            .map(|&freq| LinkwitzRiley::new(freq, sample_rate))
            .collect::<RfResult<Vec<_>>>()?;
        let compressors = config
            .bands
            .iter()
            .map(|band| {
                let comp = Compressor::new(band.compressor, sample_rate)?;
                match band.expander {
                    Some(expander) => comp.with_expander(expander),
                    None => Ok(comp),
                }
            })
            .collect::<RfResult<Vec<_>>>()?;
        let band_reduction_db = vec![0.0; config.bands.len()];

        Ok(Self {
            config,
            crossovers,
            compressors,
            band_reduction_db,
        })
    }

    pub fn config(&self) -> &MultibandConfig {
        &self.config
    }

    /// Max gain reduction per band from the last `process` call
    pub fn band_reduction_db(&self) -> &[f64] {
        &self.band_reduction_db
    }

    /// Split into bands, low to high
    pub fn split(&mut self, audio: &AudioBuffer) -> Vec<AudioBuffer> {
        let mut bands: Vec<Vec<Vec<Sample>>> = vec![Vec::new(); self.crossovers.len() + 1];

        for ch in audio.channels() {
            let mut rest = ch.to_vec();
            for (band, crossover) in bands.iter_mut().zip(self.crossovers.iter_mut()) {
                let (low, high) = crossover.split(&rest);
                band.push(low);
                rest = high;
            }
            if let Some(top) = bands.last_mut() {
                top.push(rest);
            }
        }

        bands
            .into_iter()
            .map(|mut chans| match chans.len() {
                1 => AudioBuffer::mono(chans.remove(0)),
                _ => {
                    let right = chans.pop().unwrap_or_default();
                    let left = chans.pop().unwrap_or_default();
                    AudioBuffer::stereo(left, right)
                }
            })
            .collect()
    }

    /// Split, run each band's dynamics, and sum
    pub fn process(&mut self, audio: &AudioBuffer) -> AudioBuffer {
        let bands = self.split(audio);
        let mut out = AudioBuffer::silent(audio.layout(), audio.len());

        for (i, band_audio) in bands.iter().enumerate() {
            let settings = self.config.bands[i];
            if settings.is_neutral() {
                self.band_reduction_db[i] = 0.0;
                out.mix_in(band_audio, 1.0);
                continue;
            }
            let processed = self.compressors[i].process(band_audio);
            self.band_reduction_db[i] = self.compressors[i].max_gain_reduction_db();
            log::trace!(
                "multiband band {i}: max GR {:.2} dB, trim {:.1} dB",
                self.band_reduction_db[i],
                settings.gain_db
            );
            out.mix_in(&processed, db_to_linear(settings.gain_db));
        }
        out
    }
}

impl Processor for MultibandDynamics {
    fn reset(&mut self) {
        self.crossovers.iter_mut().for_each(Processor::reset);
        self.compressors.iter_mut().for_each(Processor::reset);
        self.band_reduction_db.fill(0.0);
    }
}
