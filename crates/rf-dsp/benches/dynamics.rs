//! Dynamics processor benchmarks

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rf_core::AudioBuffer;
use rf_dsp::dynamics::{Compressor, CompressorConfig, ExpanderConfig};
use rf_dsp::multiband::{MultibandConfig, MultibandDynamics};
use rf_dsp::transient::{TransientConfig, TransientShaper};

const SR: f64 = 48000.0;

fn test_audio(len: usize) -> AudioBuffer {
    let left: Vec<f64> = (0..len).map(|i| (i as f64 * 0.01).sin() * 0.5).collect();
    let right: Vec<f64> = (0..len).map(|i| (i as f64 * 0.01).cos() * 0.5).collect();
    AudioBuffer::stereo(left, right)
}

fn bench_compressor(c: &mut Criterion) {
    let mut group = c.benchmark_group("compressor_stereo");
    let audio = test_audio(48000);

    for (name, expander) in [("plain", None), ("expander", Some(ExpanderConfig::default()))] {
        let mut comp = Compressor::new(CompressorConfig::new(-18.0, 4.0, 10.0, 100.0), SR)
            .and_then(|c| match expander {
                Some(e) => c.with_expander(e),
                None => Ok(c),
            })
            .unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(name), &name, |b, _| {
            b.iter(|| comp.process(black_box(&audio)))
        });
    }
    group.finish();
}

fn bench_multiband(c: &mut Criterion) {
    let audio = test_audio(48000);
    let mut mb = MultibandDynamics::new(MultibandConfig::mastering(), SR).unwrap();

    c.bench_function("multiband_mastering_1s", |b| {
        b.iter(|| mb.process(black_box(&audio)))
    });
}

fn bench_transient(c: &mut Criterion) {
    let audio = test_audio(48000);
    let mut shaper = TransientShaper::new(TransientConfig::new(40.0, -20.0), SR).unwrap();

    c.bench_function("transient_shaper_1s", |b| {
        b.iter(|| shaper.process(black_box(&audio)))
    });
}

criterion_group!(benches, bench_compressor, bench_multiband, bench_transient);
criterion_main!(benches);
