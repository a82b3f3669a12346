//! Mix buses and insert chains

use rf_core::{AudioBuffer, Decibels, db_to_linear, ensure_finite, ensure_range};
use rf_dsp::{
    Compressor, CompressorConfig, EqBand, MultibandConfig, MultibandDynamics, ParametricEq,
    Saturator, TransientConfig, TransientShaper,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::MixResult;
use crate::presets::track_preset;
use crate::track::TrackProcessor;

/// One stage of a bus insert chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InsertEffect {
    Eq { bands: Vec<EqBand> },
    Compressor(CompressorConfig),
    Multiband(MultibandConfig),
    Transient(TransientConfig),
    Saturation { drive: f64 },
    Gain { db: f64 },
    /// A registered track preset run as a bus insert
    TrackPreset { name: String },
}

impl InsertEffect {
    pub fn validate(&self, sample_rate: f64) -> MixResult<()> {
        match self {
            Self::Eq { bands } => {
                for band in bands {
                    band.validate(sample_rate)?;
                }
            }
            Self::Compressor(config) => config.validate()?,
            Self::Multiband(config) => config.validate(sample_rate)?,
            Self::Transient(config) => config.validate()?,
            Self::Saturation { drive } => Saturator { drive: *drive }.validate()?,
            Self::Gain { db } => ensure_finite("insert gain", *db)?,
            Self::TrackPreset { name } => {
                track_preset(name)?;
            }
        }
        Ok(())
    }

    pub fn process(&self, audio: &AudioBuffer, sample_rate: f64) -> MixResult<AudioBuffer> {
        let out = match self {
            Self::Eq { bands } => ParametricEq::apply_bands(audio, bands, sample_rate)?,
            Self::Compressor(config) => Compressor::new(*config, sample_rate)?.process(audio),
            Self::Multiband(config) => {
                MultibandDynamics::new(config.clone(), sample_rate)?.process(audio)
            }
            Self::Transient(config) => TransientShaper::new(*config, sample_rate)?.process(audio),
            Self::Saturation { drive } => Saturator::new(*drive)?.process(audio),
            Self::Gain { db } => {
                let mut out = audio.clone();
                out.apply_gain(db_to_linear(*db));
                out
            }
            Self::TrackPreset { name } => TrackProcessor::new(sample_rate)?.process(audio, name)?,
        };
        Ok(out)
    }
}

/// Bus routing and processing settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Insert chain, applied in order
    pub inserts: Vec<InsertEffect>,
    /// Fader (dB)
    pub gain_db: f64,
    /// `[-1, 1]`, constant power
    pub pan: f64,
    pub mute: bool,
    pub solo: bool,
    /// Keeps playing while another bus is soloed (return buses)
    pub solo_safe: bool,
    /// Post-fader send levels (linear), keyed by target bus
    pub sends: BTreeMap<String, f64>,
}

impl BusConfig {
    pub fn with_insert(mut self, insert: InsertEffect) -> Self {
        self.inserts.push(insert);
        self
    }

    pub fn with_gain(mut self, gain_db: f64) -> Self {
        self.gain_db = gain_db;
        self
    }

    pub fn with_pan(mut self, pan: f64) -> Self {
        self.pan = pan;
        self
    }

    pub fn with_send(mut self, target: impl Into<String>, level: f64) -> Self {
        self.sends.insert(target.into(), level);
        self
    }

    pub fn solo_safe(mut self) -> Self {
        self.solo_safe = true;
        self
    }

    /// Parameter checks; send targets are checked by the engine
    pub fn validate(&self, sample_rate: f64) -> MixResult<()> {
        for insert in &self.inserts {
            insert.validate(sample_rate)?;
        }
        ensure_finite("bus gain_db", self.gain_db)?;
        ensure_range("bus pan", self.pan, -1.0, 1.0)?;
        for level in self.sends.values() {
            ensure_range("send level", *level, 0.0, 4.0)?;
        }
        Ok(())
    }
}

/// Named accumulator plus its settings
#[derive(Debug, Clone)]
pub struct MixBus {
    pub name: String,
    pub audio: AudioBuffer,
    pub config: BusConfig,
}

impl MixBus {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, BusConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: BusConfig) -> Self {
        Self {
            name: name.into(),
            audio: AudioBuffer::empty_stereo(),
            config,
        }
    }

    /// Sum `audio` in at `gain_db`; the shorter side is zero-padded.
    /// Gains at or below `SILENCE_DB` add nothing.
    pub fn add_audio(&mut self, audio: &AudioBuffer, gain_db: f64) {
        if audio.is_empty() {
            return;
        }
        self.audio.mix_in(audio, Decibels(gain_db).to_gain());
    }

    pub fn has_audio(&self) -> bool {
        !self.audio.is_empty()
    }

    /// Hand over the accumulated audio, leaving the bus empty
    pub fn take_audio(&mut self) -> AudioBuffer {
        std::mem::take(&mut self.audio)
    }

    /// Insert chain then fader; a fader at or below `SILENCE_DB` is closed
    pub fn process_chain(&self, audio: &AudioBuffer, sample_rate: f64) -> MixResult<AudioBuffer> {
        let mut out = audio.clone();
        for insert in &self.config.inserts {
            out = insert.process(&out, sample_rate)?;
        }
        out.apply_gain(Decibels(self.config.gain_db).to_gain());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 48000.0;

    #[test]
    fn test_add_audio_sums_and_pads() {
        let mut bus = MixBus::new("drums");
        bus.add_audio(&AudioBuffer::mono(vec![0.25; 4]), 0.0);
        bus.add_audio(&AudioBuffer::stereo(vec![0.25; 6], vec![0.5; 6]), 0.0);

        assert_eq!(bus.audio.shape(), (6, 2));
        assert_eq!(bus.audio.channel(0), &[0.5, 0.5, 0.5, 0.5, 0.25, 0.25]);
        assert_eq!(bus.audio.channel(1), &[0.75, 0.75, 0.75, 0.75, 0.5, 0.5]);
    }

    #[test]
    fn test_take_audio_empties_bus() {
        let mut bus = MixBus::new("bass");
        bus.add_audio(&AudioBuffer::mono(vec![0.1; 8]), -6.0);
        let taken = bus.take_audio();
        assert_eq!(taken.len(), 8);
        assert!(!bus.has_audio());
    }

    #[test]
    fn test_closed_fader_is_silent() {
        let mut bus = MixBus::with_config("fx", BusConfig::default().with_gain(-200.0));
        let input = AudioBuffer::stereo(vec![0.8; 16], vec![-0.8; 16]);
        let out = bus.process_chain(&input, SR).unwrap();
        assert!(out.channels().all(|ch| ch.iter().all(|&s| s == 0.0)));

        bus.add_audio(&input, -150.0);
        assert!(bus.audio.channels().all(|ch| ch.iter().all(|&s| s == 0.0)));
        // just above the floor still passes signal
        bus.add_audio(&input, -140.0);
        assert!(bus.audio.peak() > 0.0);
    }

    #[test]
    fn test_chain_order_inserts_then_gain() {
        let config = BusConfig::default()
            .with_insert(InsertEffect::Gain { db: 6.0 })
            .with_gain(-6.0);
        let bus = MixBus::with_config("fx", config);
        let audio = AudioBuffer::mono(vec![0.3; 16]);
        let out = bus.process_chain(&audio, SR).unwrap();
        for s in out.channel(0) {
            assert!((s - 0.3).abs() < 1e-12);
        }
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(BusConfig::default().with_pan(1.5).validate(SR).is_err());
        assert!(BusConfig::default().with_send("reverb", -0.1).validate(SR).is_err());
        let bad_insert = BusConfig::default().with_insert(InsertEffect::TrackPreset {
            name: "nope".to_string(),
        });
        assert!(bad_insert.validate(SR).is_err());
    }

    #[test]
    fn test_insert_from_json() {
        let config: BusConfig = serde_json::from_str(
            r#"{
                "inserts": [
                    {"type": "eq", "bands": [{"freq": 100.0, "gain_db": 0.0, "q": 0.7, "band_type": "highpass"}]},
                    {"type": "compressor", "threshold_db": -18.0, "ratio": 3.0},
                    {"type": "saturation", "drive": 2.0},
                    {"type": "track_preset", "name": "vocal_lead"}
                ],
                "pan": -0.25,
                "sends": {"reverb": 0.3}
            }"#,
        )
        .unwrap();
        assert_eq!(config.inserts.len(), 4);
        assert!(matches!(config.inserts[1], InsertEffect::Compressor(c) if c.ratio == 3.0));
        assert_eq!(config.sends["reverb"], 0.3);
        assert!(config.validate(SR).is_ok());
    }
}
