//! DSP Integration Tests
//!
//! Tests complete signal flow through DSP processing chains.
//! Verifies:
//! - Track-style chain (saturate → EQ → compress → transient) stays finite
//! - Neutral settings pass audio through untouched
//! - Multiband reconstruction and per-band dynamics
//! - Causality of every recurrence

use rf_core::{AudioBuffer, ChannelLayout};
use rf_dsp::dynamics::{Compressor, CompressorConfig, ExpanderConfig};
use rf_dsp::eq::{EqBand, ParametricEq};
use rf_dsp::multiband::{BandDynamics, MultibandConfig, MultibandDynamics};
use rf_dsp::saturation::Saturator;
use rf_dsp::transient::{TransientConfig, TransientShaper};

const SAMPLE_RATE: f64 = 48000.0;

/// Generate test sine wave
fn generate_sine(samples: usize, freq: f64, amp: f64) -> Vec<f64> {
    (0..samples)
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE;
            amp * (2.0 * std::f64::consts::PI * freq * t).sin()
        })
        .collect()
}

/// Deterministic white noise in [-1, 1]
fn generate_noise(samples: usize) -> Vec<f64> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    (0..samples)
        .map(|i| {
            let mut hasher = DefaultHasher::new();
            i.hash(&mut hasher);
            let h = hasher.finish();
            (h as f64 / u64::MAX as f64) * 2.0 - 1.0
        })
        .collect()
}

fn run_chain(
    audio: &AudioBuffer,
    drive: f64,
    bands: &[EqBand],
    comp: CompressorConfig,
    transient: TransientConfig,
) -> AudioBuffer {
    let saturated = Saturator::new(drive).unwrap().process(audio);
    let equalized = ParametricEq::apply_bands(&saturated, bands, SAMPLE_RATE).unwrap();
    let compressed = Compressor::new(comp, SAMPLE_RATE).unwrap().process(&equalized);
    TransientShaper::new(transient, SAMPLE_RATE)
        .unwrap()
        .process(&compressed)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIGNAL INTEGRITY TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_neutral_chain_is_identity() {
    let audio = AudioBuffer::stereo(
        generate_sine(24000, 440.0, 0.7),
        generate_noise(24000).iter().map(|x| x * 0.5).collect(),
    );
    let out = run_chain(
        &audio,
        1.0,
        &[],
        CompressorConfig::unity(),
        TransientConfig::default(),
    );
    for (a, b) in audio.interleaved().iter().zip(out.interleaved()) {
        assert!((a - b).abs() < 1e-12);
    }
}

#[test]
fn test_hot_chain_stays_finite() {
    let audio = AudioBuffer::stereo(
        generate_noise(48000).iter().map(|x| x * 4.0).collect(),
        generate_sine(48000, 60.0, 3.0),
    );
    let out = run_chain(
        &audio,
        8.0,
        &[
            EqBand::low_shelf(80.0, 12.0, 0.7),
            EqBand::peak(3000.0, 9.0, 4.0),
            EqBand::highpass(25.0, 0.707),
        ],
        CompressorConfig::new(-30.0, 20.0, 0.1, 20.0).with_makeup(12.0),
        TransientConfig::new(100.0, 100.0),
    );
    assert!(out.is_finite(), "chain produced NaN/Inf");
    assert_eq!(out.shape(), audio.shape());
}

#[test]
fn test_empty_buffers_pass_through() {
    let empty = AudioBuffer::empty_stereo();
    let out = run_chain(
        &empty,
        3.0,
        &[EqBand::peak(1000.0, 3.0, 1.0)],
        CompressorConfig::default(),
        TransientConfig::new(20.0, 20.0),
    );
    assert_eq!(out.shape(), (0, 2));

    let mut mb = MultibandDynamics::new(MultibandConfig::mastering(), SAMPLE_RATE).unwrap();
    assert_eq!(mb.process(&empty).shape(), (0, 2));
}

// ═══════════════════════════════════════════════════════════════════════════════
// CAUSALITY
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_processing_is_causal() {
    let full = generate_noise(4800);
    let prefix: Vec<f64> = full[..2400].to_vec();

    let bands = [EqBand::peak(2000.0, 6.0, 1.0)];
    let comp = CompressorConfig::new(-24.0, 6.0, 1.0, 50.0);
    let transient_free = TransientConfig::default();

    let a = run_chain(&AudioBuffer::mono(full), 2.0, &bands, comp, transient_free);
    let b = run_chain(&AudioBuffer::mono(prefix), 2.0, &bands, comp, transient_free);
    for i in 0..2400 {
        assert!((a.channel(0)[i] - b.channel(0)[i]).abs() < 1e-12);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MULTIBAND
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_multiband_reconstruction_noise() {
    let audio = AudioBuffer::stereo(generate_noise(48000), generate_sine(48000, 997.0, 0.5));
    let crossovers = vec![100.0, 400.0, 2000.0, 8000.0];
    let mut mb = MultibandDynamics::new(MultibandConfig::neutral(crossovers), SAMPLE_RATE).unwrap();

    let bands = mb.split(&audio);
    let mut sum = AudioBuffer::silent(ChannelLayout::Stereo, audio.len());
    for band in &bands {
        sum.mix_in(band, 1.0);
    }
    sum.mix_in(&audio, -1.0);
    assert!(sum.rms_db() - audio.rms_db() < -60.0);
}

#[test]
fn test_multiband_expander_lifts_quiet_high_band() {
    let mut config = MultibandConfig::neutral(vec![1000.0]);
    config.bands[1] = BandDynamics::default().with_expander(ExpanderConfig::default());

    let quiet_high = AudioBuffer::mono(generate_sine(96000, 6000.0, 0.004));
    let mut mb = MultibandDynamics::new(config, SAMPLE_RATE).unwrap();
    let out = mb.process(&quiet_high);
    assert!(out.rms_db() > quiet_high.rms_db() + 3.0);
}
