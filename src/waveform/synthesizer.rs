// src/waveform/synthesizer.rs
//! Heart-rate scaled stream synthesis
//!
//! A stream is a few cycles of a rhythm template stretched to the requested
//! rate. Snapshots are immutable: any parameter change produces a new
//! [`WaveformSnapshot`] behind a fresh `Arc`, which renderers pick up on
//! their next frame.

use super::detector::{detect_pacing_spikes, detect_peaks, synthetic_spikes, EventIndexSet};
use crate::config::constants::{device, waveform};
use crate::config::{DetectionConfig, SimulatorConfig, WaveformConfig};
use crate::rhythm::{generate_pacing_template, pleth_template, template_for, RhythmType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Pacer timing behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PacerMode {
    /// Stimulate at the set frequency regardless of intrinsic activity
    #[default]
    Fixed,
    /// Inhibit stimulation while the intrinsic rate reaches the set frequency
    Demand,
}

/// Pacer settings relevant to synthesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PacingParams {
    pub is_pacing: bool,
    pub frequency_ppm: u32,
    pub intensity_ma: u32,
    pub mode: PacerMode,
}

impl Default for PacingParams {
    fn default() -> Self {
        Self {
            is_pacing: false,
            frequency_ppm: device::DEFAULT_PACER_FREQUENCY_PPM,
            intensity_ma: device::DEFAULT_PACER_INTENSITY_MA,
            mode: PacerMode::Fixed,
        }
    }
}

/// Everything a stream depends on. Two equal parameter sets always produce
/// the same stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaveformParams {
    pub rhythm: RhythmType,
    pub heart_rate: u32,
    pub pacing: PacingParams,
}

impl Default for WaveformParams {
    fn default() -> Self {
        Self {
            rhythm: RhythmType::Sinus,
            heart_rate: waveform::DEFAULT_HEART_RATE_BPM as u32,
            pacing: PacingParams::default(),
        }
    }
}

/// What the pacer is doing to the displayed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureState {
    NotPacing,
    /// Every stimulation produces an evoked complex
    Captured,
    /// Stimulation marks over the patient's escape rhythm
    NoCapture,
}

/// Whether `intensity_ma` captures at `threshold_ma`
pub fn is_captured(intensity_ma: u32, threshold_ma: u32) -> bool {
    intensity_ma >= threshold_ma
}

/// Sample buffer with its normalization bounds
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformStream {
    samples: Vec<f32>,
    min: f32,
    max: f32,
}

impl WaveformStream {
    /// Wrap `samples`; an empty buffer becomes a single zero sample.
    pub fn new(mut samples: Vec<f32>) -> Self {
        if samples.is_empty() {
            samples.push(0.0);
        }
        let (min, max) = samples
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        Self { samples, min, max }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Sample at `index`, wrapping around the buffer
    pub fn sample_at(&self, index: usize) -> f32 {
        self.samples[index % self.samples.len()]
    }
}

/// Immutable result of one synthesis
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformSnapshot {
    pub params: WaveformParams,
    pub stream: WaveformStream,
    /// R-peaks, for synchro markers and shock gating
    pub peaks: EventIndexSet,
    /// Pacing stimulation marks
    pub spikes: EventIndexSet,
    pub capture: CaptureState,
    /// Draw with the fixed mV-to-pixel gain instead of min/max normalization
    pub gain_mapped: bool,
    /// Samples in one cardiac cycle at the synthesized rate
    pub cycle_samples: usize,
}

/// Build the stream, peaks and spikes for `params`.
pub fn synthesize(params: &WaveformParams, config: &SimulatorConfig) -> WaveformSnapshot {
    let wf = &config.waveform;
    let heart_rate = clamp_heart_rate(params.heart_rate);
    let pacing = params.pacing;

    if pacing.is_pacing {
        let frequency = pacing
            .frequency_ppm
            .clamp(device::MIN_PACER_FREQUENCY_PPM, device::MAX_PACER_FREQUENCY_PPM);

        if is_captured(pacing.intensity_ma, wf.capture_threshold_ma) {
            let cycle = generate_pacing_template(frequency);
            let target = rescale_len(cycle.len(), 1.0, wf);
            let cycle = resample_periodic(&cycle, target);
            let stream = WaveformStream::new(repeat(&cycle, wf.stream_cycles));
            let spikes = detect_pacing_spikes(stream.samples(), &config.detection);

            return WaveformSnapshot {
                params: *params,
                stream,
                peaks: EventIndexSet::new(),
                spikes,
                capture: CaptureState::Captured,
                gain_mapped: true,
                cycle_samples: cycle.len(),
            };
        }

        let (stream, cycle_samples) = scaled_stream(template_for(RhythmType::Bav3).samples(), 1, heart_rate, wf);
        let inhibited = pacing.mode == PacerMode::Demand && heart_rate >= frequency as f32;
        let spikes = if inhibited {
            EventIndexSet::new()
        } else {
            let interval = ((60.0 / frequency as f32) * wf.sampling_rate_hz as f32).floor() as usize;
            synthetic_spikes(stream.len(), interval)
        };

        return WaveformSnapshot {
            params: *params,
            stream,
            peaks: EventIndexSet::new(),
            spikes,
            capture: CaptureState::NoCapture,
            gain_mapped: true,
            cycle_samples,
        };
    }

    let template = template_for(params.rhythm);
    let (stream, cycle_samples) = scaled_stream(template.samples(), template.beats(), heart_rate, wf);
    let peaks = peaks_for(params.rhythm, &stream, &config.detection);

    WaveformSnapshot {
        params: *params,
        stream,
        peaks,
        spikes: EventIndexSet::new(),
        capture: CaptureState::NotPacing,
        gain_mapped: params.rhythm.uses_gain_mapping(),
        cycle_samples,
    }
}

/// Plethysmography stream at the patient's rate
pub fn synthesize_pleth(params: &WaveformParams, config: &SimulatorConfig) -> WaveformSnapshot {
    let heart_rate = clamp_heart_rate(params.heart_rate);
    let (stream, cycle_samples) = scaled_stream(pleth_template(), 1, heart_rate, &config.waveform);

    WaveformSnapshot {
        params: *params,
        stream,
        peaks: EventIndexSet::new(),
        spikes: EventIndexSet::new(),
        capture: CaptureState::NotPacing,
        gain_mapped: false,
        cycle_samples,
    }
}

fn peaks_for(rhythm: RhythmType, stream: &WaveformStream, detection: &DetectionConfig) -> EventIndexSet {
    if rhythm.has_discrete_qrs() {
        detect_peaks(stream.samples(), detection)
    } else {
        EventIndexSet::new()
    }
}

fn clamp_heart_rate(heart_rate: u32) -> f32 {
    (heart_rate as f32).clamp(waveform::MIN_HEART_RATE_BPM, waveform::MAX_HEART_RATE_BPM)
}

/// Stream of `wf.stream_cycles` beats built from a template holding `beats`
/// beats at the native rate. Returns the stream and the per-beat length.
fn scaled_stream(template: &[f32], beats: usize, heart_rate: f32, wf: &WaveformConfig) -> (WaveformStream, usize) {
    let stretch = waveform::REFERENCE_HEART_RATE_BPM / heart_rate;
    let target = rescale_len(template.len(), stretch, wf);
    let pass = resample_periodic(template, target);

    let beats = beats.max(1);
    let passes = wf.stream_cycles.max(1).div_ceil(beats);
    let cycle_samples = (pass.len() / beats).max(1);
    (WaveformStream::new(repeat(&pass, passes)), cycle_samples)
}

/// Length of a 250 Hz buffer of `len` samples once stretched by `stretch`
/// and expressed at the configured sampling rate.
fn rescale_len(len: usize, stretch: f32, wf: &WaveformConfig) -> usize {
    let rate_ratio = wf.sampling_rate_hz as f32 / waveform::SAMPLING_RATE_HZ as f32;
    ((len as f32 * stretch * rate_ratio).round() as usize).max(1)
}

/// Linear resampling of one period; the last output interpolates towards
/// the first input so repeated periods join without a step.
fn resample_periodic(samples: &[f32], target_len: usize) -> Vec<f32> {
    if samples.is_empty() || target_len == 0 {
        return Vec::new();
    }
    if samples.len() == target_len {
        return samples.to_vec();
    }

    let n = samples.len();
    let step = n as f32 / target_len as f32;
    (0..target_len)
        .map(|k| {
            let position = k as f32 * step;
            let index = position.floor() as usize;
            let frac = position - index as f32;
            let a = samples[index % n];
            let b = samples[(index + 1) % n];
            a + (b - a) * frac
        })
        .collect()
}

fn repeat(cycle: &[f32], times: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(cycle.len() * times);
    for _ in 0..times {
        out.extend_from_slice(cycle);
    }
    out
}

/// Caches the current snapshot and rebuilds only when parameters change
pub struct WaveformSynthesizer {
    config: SimulatorConfig,
    ecg: Option<Arc<WaveformSnapshot>>,
    pleth: Option<Arc<WaveformSnapshot>>,
    rebuilds: u64,
}

impl WaveformSynthesizer {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            ecg: None,
            pleth: None,
            rebuilds: 0,
        }
    }

    /// ECG snapshot for `params`, reusing the cached one when nothing changed
    pub fn snapshot(&mut self, params: &WaveformParams) -> Arc<WaveformSnapshot> {
        if let Some(current) = &self.ecg {
            if current.params == *params {
                return Arc::clone(current);
            }
        }

        let snapshot = Arc::new(synthesize(params, &self.config));
        self.rebuilds += 1;
        debug!(
            rhythm = %params.rhythm,
            heart_rate = params.heart_rate,
            pacing = params.pacing.is_pacing,
            samples = snapshot.stream.len(),
            peaks = snapshot.peaks.len(),
            spikes = snapshot.spikes.len(),
            "waveform rebuilt"
        );
        self.ecg = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Pleth snapshot; only the heart rate matters
    pub fn pleth_snapshot(&mut self, params: &WaveformParams) -> Arc<WaveformSnapshot> {
        if let Some(current) = &self.pleth {
            if current.params.heart_rate == params.heart_rate {
                return Arc::clone(current);
            }
        }

        let snapshot = Arc::new(synthesize_pleth(params, &self.config));
        self.pleth = Some(Arc::clone(&snapshot));
        snapshot
    }

    pub fn current(&self) -> Option<Arc<WaveformSnapshot>> {
        self.ecg.clone()
    }

    /// Number of ECG rebuilds since construction
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }
}
