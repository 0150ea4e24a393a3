// src/waveform/mod.rs
//! Waveform stream synthesis and cardiac event detection

pub mod detector;
pub mod synthesizer;

pub use detector::{detect_pacing_spikes, detect_peaks, synthetic_spikes, EventIndexSet};
pub use synthesizer::{
    is_captured, synthesize, synthesize_pleth, CaptureState, PacerMode, PacingParams,
    WaveformParams, WaveformSnapshot, WaveformStream, WaveformSynthesizer,
};
