//! Loudness normalization
//!
//! Measure integrated loudness, then apply the single linear gain that
//! moves it onto the target. Silent audio (K-weighted energy at or below
//! [`SILENCE_POWER`]) is returned unchanged.

use rf_core::{AudioBuffer, RfResult, db_to_linear, ensure_range};

use crate::loudness::{LoudnessMeter, SILENCE_POWER, power_to_lufs};

/// Result of one normalization
#[derive(Debug, Clone)]
pub struct Normalized {
    pub audio: AudioBuffer,
    /// Loudness before the gain (LUFS)
    pub input_lufs: f64,
    /// Gain applied (dB); 0 when skipped
    pub gain_db: f64,
}

/// Target-loudness normalizer
#[derive(Debug, Clone)]
pub struct LoudnessNormalizer {
    meter: LoudnessMeter,
    target_lufs: f64,
}

impl LoudnessNormalizer {
    pub fn new(sample_rate: f64, target_lufs: f64) -> RfResult<Self> {
        ensure_range("target_lufs", target_lufs, -60.0, 0.0)?;
        Ok(Self {
            meter: LoudnessMeter::new(sample_rate)?,
            target_lufs,
        })
    }

    pub fn target_lufs(&self) -> f64 {
        self.target_lufs
    }

    /// Gain needed to hit the target, `None` for silence
    pub fn gain_db(&mut self, audio: &AudioBuffer) -> Option<f64> {
        let power = self.meter.integrated_power(audio);
        (power > SILENCE_POWER).then(|| self.target_lufs - power_to_lufs(power))
    }

    pub fn process(&mut self, audio: &AudioBuffer) -> Normalized {
        let power = self.meter.integrated_power(audio);
        let input_lufs = power_to_lufs(power);
        if power <= SILENCE_POWER {
            if !audio.is_empty() {
                log::warn!("normalization skipped: input is silent");
            }
            return Normalized {
                audio: audio.clone(),
                input_lufs,
                gain_db: 0.0,
            };
        }

        let gain_db = self.target_lufs - input_lufs;
        let mut out = audio.clone();
        out.apply_gain(db_to_linear(gain_db));
        log::debug!(
            "normalize: {input_lufs:.2} LUFS -> {:.2} LUFS ({gain_db:+.2} dB)",
            self.target_lufs
        );
        Normalized {
            audio: out,
            input_lufs,
            gain_db,
        }
    }
}

/// Normalize `audio` to `target_lufs` integrated loudness
pub fn normalize_to_lufs(
    audio: &AudioBuffer,
    sample_rate: f64,
    target_lufs: f64,
) -> RfResult<AudioBuffer> {
    Ok(LoudnessNormalizer::new(sample_rate, target_lufs)?
        .process(audio)
        .audio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loudness::LUFS_FLOOR;
    use approx::assert_relative_eq;
    use rf_core::ChannelLayout;

    const SR: f64 = 48000.0;

    #[test]
    fn test_hits_target() {
        let tone: Vec<f64> = (0..48000)
            .map(|i| 0.05 * (2.0 * std::f64::consts::PI * 220.0 * i as f64 / SR).sin())
            .collect();
        let audio = AudioBuffer::stereo(tone.clone(), tone);
        let out = normalize_to_lufs(&audio, SR, -14.0).unwrap();

        let mut meter = LoudnessMeter::new(SR).unwrap();
        assert_relative_eq!(meter.integrated(&out), -14.0, epsilon = 1e-6);
    }

    #[test]
    fn test_very_quiet_input_is_normalized() {
        // -80 dBFS, well under the -70 LUFS silence sentinel
        let tone: Vec<f64> = (0..48000)
            .map(|i| 1e-4 * (2.0 * std::f64::consts::PI * 1000.0 * i as f64 / SR).sin())
            .collect();
        let audio = AudioBuffer::stereo(tone.clone(), tone);
        let mut norm = LoudnessNormalizer::new(SR, -14.0).unwrap();
        let result = norm.process(&audio);
        assert!(result.input_lufs < LUFS_FLOOR);
        assert!(result.gain_db > 60.0);

        let mut meter = LoudnessMeter::new(SR).unwrap();
        assert_relative_eq!(meter.integrated(&result.audio), -14.0, epsilon = 1e-6);
    }

    #[test]
    fn test_silence_unchanged() {
        let silent = AudioBuffer::silent(ChannelLayout::Stereo, 4800);
        let mut norm = LoudnessNormalizer::new(SR, -14.0).unwrap();
        assert_eq!(norm.gain_db(&silent), None);

        let result = norm.process(&silent);
        assert_eq!(result.audio, silent);
        assert_eq!(result.gain_db, 0.0);
        assert_eq!(result.input_lufs, LUFS_FLOOR);
    }

    #[test]
    fn test_rejects_absurd_target() {
        assert!(LoudnessNormalizer::new(SR, 6.0).is_err());
        assert!(normalize_to_lufs(&AudioBuffer::empty_stereo(), SR, f64::NAN).is_err());
    }
}
