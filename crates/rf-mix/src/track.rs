//! Per-track processing
//!
//! Fixed order: saturate → EQ → compress → transient-shape → output gain →
//! safety soft clip if the result peaks above 0.99.

use rf_core::{AudioBuffer, RfError, db_to_linear};
use rf_dsp::{
    Compressor, ParametricEq, SAFETY_CEILING, Saturator, TransientShaper, soft_clip_if_hot,
};

use crate::error::MixResult;
use crate::presets::{TrackPreset, track_preset};

/// Runs track presets at one sample rate
#[derive(Debug, Clone, Copy)]
pub struct TrackProcessor {
    sample_rate: f64,
}

impl TrackProcessor {
    pub fn new(sample_rate: f64) -> MixResult<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(RfError::InvalidSampleRate(sample_rate.max(0.0) as u32).into());
        }
        Ok(Self { sample_rate })
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Process through a registered preset
    pub fn process(&self, audio: &AudioBuffer, preset_name: &str) -> MixResult<AudioBuffer> {
        self.process_preset(audio, track_preset(preset_name)?)
    }

    pub fn process_preset(&self, audio: &AudioBuffer, preset: &TrackPreset) -> MixResult<AudioBuffer> {
        let saturator = Saturator::new(preset.drive)?;
        let mut compressor = Compressor::new(preset.compressor, self.sample_rate)?;
        let mut shaper = TransientShaper::new(preset.transient, self.sample_rate)?;

        if audio.is_empty() {
            return Ok(audio.clone());
        }

        let mut input = audio.clone();
        let scrubbed = input.sanitize();
        if scrubbed > 0 {
            log::warn!("track '{}': replaced {scrubbed} non-finite samples", preset.name);
        }

        let saturated = saturator.process(&input);
        let equalized = ParametricEq::apply_bands(&saturated, &preset.eq, self.sample_rate)?;
        let compressed = compressor.process(&equalized);
        let mut out = shaper.process(&compressed);
        out.apply_gain(db_to_linear(preset.output_gain_db));

        if soft_clip_if_hot(&mut out, SAFETY_CEILING) {
            log::debug!("track '{}': safety soft clip engaged", preset.name);
        }
        log::trace!(
            "track '{}': GR {:.2} dB, peak {:.2} dBFS",
            preset.name,
            compressor.max_gain_reduction_db(),
            out.peak_db()
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MixError;
    use crate::presets::preset_names;

    const SR: f64 = 48000.0;

    fn sine(freq: f64, amp: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| amp * (2.0 * std::f64::consts::PI * freq * i as f64 / SR).sin())
            .collect()
    }

    #[test]
    fn test_clean_is_identity() {
        let audio = AudioBuffer::stereo(sine(440.0, 0.5, 4800), sine(660.0, 0.4, 4800));
        let out = TrackProcessor::new(SR).unwrap().process(&audio, "clean").unwrap();
        for (a, b) in audio.channels().zip(out.channels()) {
            for (x, y) in a.iter().zip(b) {
                assert!((x - y).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_trap_808_full_scale_sine() {
        let audio = AudioBuffer::mono(sine(1000.0, 1.0, 48000));
        let out = TrackProcessor::new(SR).unwrap().process(&audio, "trap_808").unwrap();
        assert!(out.is_finite());
        assert!(out.peak() <= SAFETY_CEILING);
    }

    #[test]
    fn test_no_preset_clips() {
        let processor = TrackProcessor::new(SR).unwrap();
        let audio = AudioBuffer::stereo(sine(80.0, 1.0, 24000), sine(3000.0, 1.0, 24000));
        for name in preset_names() {
            let out = processor.process(&audio, name).unwrap();
            assert!(out.peak() <= 1.0, "{name} peaked at {}", out.peak());
            assert!(out.is_finite(), "{name} produced non-finite output");
        }
    }

    #[test]
    fn test_unknown_preset() {
        let processor = TrackProcessor::new(SR).unwrap();
        assert!(matches!(
            processor.process(&AudioBuffer::mono(vec![0.0; 16]), "nope"),
            Err(MixError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_empty_buffer() {
        let processor = TrackProcessor::new(SR).unwrap();
        let out = processor.process(&AudioBuffer::empty_stereo(), "kick_punchy").unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_invalid_sample_rate() {
        assert!(TrackProcessor::new(0.0).is_err());
        assert!(TrackProcessor::new(f64::NAN).is_err());
    }
}
