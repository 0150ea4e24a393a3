use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use defib_core::config::{SimulatorConfig, SurfaceConfig};
use defib_core::render::{FrameBuffer, ScrollingRenderer, ViewOptions};
use defib_core::rhythm::RhythmType;
use defib_core::waveform::{detect_peaks, synthesize, PacingParams, WaveformParams};
use std::time::Duration;

const HEART_RATES: &[u32] = &[30, 70, 150, 220];
const FRAME_RATES: &[u64] = &[30, 60, 120];

fn params(rhythm: RhythmType, heart_rate: u32) -> WaveformParams {
    WaveformParams {
        rhythm,
        heart_rate,
        pacing: PacingParams::default(),
    }
}

fn benchmark_synthesis(c: &mut Criterion) {
    let mut group = c.benchmark_group("synthesis");
    let config = SimulatorConfig::default();

    for rhythm in [RhythmType::Sinus, RhythmType::FibrillationAtriale, RhythmType::TachycardieVentriculaire] {
        for &heart_rate in HEART_RATES {
            group.bench_with_input(
                BenchmarkId::new(rhythm.identifier(), heart_rate),
                &heart_rate,
                |b, &hr| b.iter(|| synthesize(black_box(&params(rhythm, hr)), &config)),
            );
        }
    }

    let paced = WaveformParams {
        pacing: PacingParams {
            is_pacing: true,
            frequency_ppm: 80,
            intensity_ma: 120,
            ..PacingParams::default()
        },
        ..WaveformParams::default()
    };
    group.bench_function("pacing_captured", |b| b.iter(|| synthesize(black_box(&paced), &config)));

    group.finish();
}

fn benchmark_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("detection");
    let config = SimulatorConfig::default();

    for &heart_rate in HEART_RATES {
        let stream = synthesize(&params(RhythmType::Sinus, heart_rate), &config).stream;
        group.throughput(Throughput::Elements(stream.len() as u64));
        group.bench_with_input(BenchmarkId::new("qrs", heart_rate), &stream, |b, stream| {
            b.iter(|| detect_peaks(black_box(stream.samples()), &config.detection))
        });
    }

    group.finish();
}

fn benchmark_rendering(c: &mut Criterion) {
    let mut group = c.benchmark_group("rendering");
    let config = SimulatorConfig::default();
    let snapshot = synthesize(&params(RhythmType::Sinus, 70), &config);
    let view = ViewOptions {
        show_synchro_markers: true,
        ..ViewOptions::default()
    };

    for &fps in FRAME_RATES {
        let period = Duration::from_micros(1_000_000 / fps);
        group.bench_with_input(BenchmarkId::new("ecg_second", fps), &period, |b, &period| {
            b.iter(|| {
                let mut renderer = ScrollingRenderer::new(SurfaceConfig::ecg(), 250).unwrap();
                let mut surface = FrameBuffer::new(800, 65);
                for frame in 0..=fps as u32 {
                    renderer.render_frame(&mut surface, period * frame, &snapshot, &view);
                }
                black_box(surface.count(defib_core::render::Color(0x00ff00)))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_synthesis, benchmark_detection, benchmark_rendering);
criterion_main!(benches);
