// src/rhythm/templates.rs
//! Rhythm template library
//!
//! Templates are sampled at the reference rate (250 Hz) and sized so that one
//! ventricular beat lasts one second, i.e. the native rate is 60 bpm. Shapes
//! are built from Gaussian waves once per process and cached.

use super::RhythmType;
use crate::config::constants::waveform::{REFERENCE_HEART_RATE_BPM, SAMPLING_RATE_HZ};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;
use std::sync::OnceLock;

/// Samples in one beat at the native rate.
const BEAT_SAMPLES: usize = SAMPLING_RATE_HZ as usize;

/// Sample carrying the pacing spike inside a generated pacing cycle.
pub const PACING_SPIKE_OFFSET: usize = 5;
const PACING_SPIKE_AMPLITUDE: f32 = 1.6;

const FIBRILLATION_SEED: u64 = 0x5eed_f1b;

static TEMPLATES: OnceLock<Vec<RhythmTemplate>> = OnceLock::new();
static PLETH: OnceLock<Vec<f32>> = OnceLock::new();

/// Stored template for one rhythm
#[derive(Debug, Clone, PartialEq)]
pub struct RhythmTemplate {
    rhythm: RhythmType,
    samples: Vec<f32>,
    beats: usize,
}

impl RhythmTemplate {
    pub fn rhythm(&self) -> RhythmType {
        self.rhythm
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Ventricular beats covered by the samples. Irregular rhythms store
    /// several beats so their variability survives concatenation.
    pub fn beats(&self) -> usize {
        self.beats
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Template for `rhythm`. `electroEntrainement` returns the pacing template
/// generated at 60 ppm; use [`generate_pacing_template`] for other rates.
pub fn template_for(rhythm: RhythmType) -> &'static RhythmTemplate {
    let templates = TEMPLATES.get_or_init(|| RhythmType::ALL.iter().map(|r| build(*r)).collect());
    // ALL lists the variants in declaration order
    &templates[rhythm as usize]
}

/// One pacing cycle at `frequency_ppm`: a single-sample stimulation spike
/// followed by a wide evoked complex. The cycle lasts `60 / frequency`
/// seconds at the reference rate.
pub fn generate_pacing_template(frequency_ppm: u32) -> Vec<f32> {
    let frequency = frequency_ppm.max(1) as f32;
    let cycle = ((60.0 / frequency) * SAMPLING_RATE_HZ as f32).round().max(1.0) as usize;

    let qrs_center = (PACING_SPIKE_OFFSET + 18) as f32;
    let t_center = qrs_center + (cycle as f32 * 0.3).clamp(25.0, 60.0);
    let mut samples = render(
        cycle,
        &[
            Wave::new(qrs_center, 6.0, 1.2),
            Wave::new(t_center, 8.0, -0.35),
        ],
    );

    if PACING_SPIKE_OFFSET < cycle {
        samples[PACING_SPIKE_OFFSET] = PACING_SPIKE_AMPLITUDE;
    }
    samples
}

/// One plethysmography pulse at the native rate
pub fn pleth_template() -> &'static [f32] {
    PLETH.get_or_init(|| {
        render(
            BEAT_SAMPLES,
            &[
                Wave::new(75.0, 18.0, 1.0),
                Wave::new(140.0, 22.0, 0.45),
            ],
        )
    })
}

/// Gaussian component of a synthetic wave
#[derive(Debug, Clone, Copy)]
struct Wave {
    center: f32,
    width: f32,
    amplitude: f32,
}

impl Wave {
    const fn new(center: f32, width: f32, amplitude: f32) -> Self {
        Self { center, width, amplitude }
    }

    fn at(&self, t: f32) -> f32 {
        let z = (t - self.center) / self.width;
        self.amplitude * (-0.5 * z * z).exp()
    }
}

fn render(len: usize, waves: &[Wave]) -> Vec<f32> {
    (0..len)
        .map(|i| waves.iter().map(|w| w.at(i as f32)).sum())
        .collect()
}

/// P, Q, R, S and T waves of a narrow complex with the R apex at `r`
fn narrow_complex(p: Option<f32>, r: f32, t: f32) -> Vec<Wave> {
    let mut waves = vec![
        Wave::new(r - 7.0, 2.0, -0.12),
        Wave::new(r, 2.5, 1.2),
        Wave::new(r + 6.0, 2.5, -0.25),
        Wave::new(t, 14.0, 0.3),
    ];
    if let Some(p) = p {
        waves.push(Wave::new(p, 7.0, 0.15));
    }
    waves
}

fn build(rhythm: RhythmType) -> RhythmTemplate {
    let (samples, beats) = match rhythm {
        RhythmType::Sinus => (render(BEAT_SAMPLES, &narrow_complex(Some(50.0), 95.0, 155.0)), 1),
        RhythmType::Bav1 => (render(BEAT_SAMPLES, &narrow_complex(Some(20.0), 100.0, 160.0)), 1),
        RhythmType::Bav3 => {
            let waves = [
                // atrial activity unrelated to the escape rhythm
                Wave::new(30.0, 7.0, 0.15),
                Wave::new(115.0, 7.0, 0.15),
                Wave::new(200.0, 7.0, 0.15),
                Wave::new(100.0, 4.0, 1.6),
                Wave::new(112.0, 5.0, -0.3),
                Wave::new(170.0, 16.0, 0.35),
            ];
            (render(BEAT_SAMPLES, &waves), 1)
        }
        RhythmType::FibrillationAtriale => (atrial_fibrillation(), 4),
        RhythmType::TachycardieVentriculaire => {
            let waves = [Wave::new(80.0, 5.0, 2.0), Wave::new(150.0, 14.0, -0.8)];
            (render(BEAT_SAMPLES, &waves), 1)
        }
        RhythmType::FibrillationVentriculaire => (ventricular_fibrillation(), 4),
        RhythmType::Asystole => {
            let samples = (0..BEAT_SAMPLES)
                .map(|i| 0.02 * (2.0 * PI * i as f32 / BEAT_SAMPLES as f32).sin())
                .collect();
            (samples, 1)
        }
        RhythmType::ElectroEntrainement => {
            (generate_pacing_template(REFERENCE_HEART_RATE_BPM as u32), 1)
        }
        RhythmType::Choc => (shock_artefact(), 1),
    };

    RhythmTemplate { rhythm, samples, beats }
}

/// Four irregular beats over fibrillatory baseline, no P waves
fn atrial_fibrillation() -> Vec<f32> {
    let len = 4 * BEAT_SAMPLES;
    let r_peaks = [90.0, 330.0, 520.0, 840.0];

    let mut waves = Vec::new();
    for r in r_peaks {
        waves.extend(narrow_complex(None, r, r + 60.0));
    }

    let mut samples = render(len, &waves);
    for (i, sample) in samples.iter_mut().enumerate() {
        let t = i as f32 / len as f32;
        // f waves: whole periods over the template so cycles join seamlessly
        *sample += 0.04 * (2.0 * PI * 25.0 * t).sin() + 0.02 * (2.0 * PI * 37.0 * t + 1.3).sin();
    }
    samples
}

/// Chaotic undulations from a fixed seed
fn ventricular_fibrillation() -> Vec<f32> {
    let len = 4 * BEAT_SAMPLES;
    let mut rng = StdRng::seed_from_u64(FIBRILLATION_SEED);

    let components: Vec<(f32, f32, f32)> = (0..4)
        .map(|_| {
            let periods = rng.gen_range(16..=28) as f32;
            let amplitude = rng.gen_range(0.15..0.35);
            let phase = rng.gen_range(0.0..(2.0 * PI));
            (periods, amplitude, phase)
        })
        .collect();

    (0..len)
        .map(|i| {
            let t = i as f32 / len as f32;
            let envelope = 0.75 + 0.25 * (2.0 * PI * 3.0 * t).sin();
            let wave: f32 = components
                .iter()
                .map(|(periods, amplitude, phase)| amplitude * (2.0 * PI * periods * t + phase).sin())
                .sum();
            envelope * wave
        })
        .collect()
}

/// Defibrillation artefact: saturating deflection, then slow recovery
fn shock_artefact() -> Vec<f32> {
    const ONSET: usize = 10;
    (0..BEAT_SAMPLES)
        .map(|i| {
            if i < ONSET {
                return 0.0;
            }
            let t = (i - ONSET) as f32;
            let fast = (-t / 8.0).exp();
            3.0 * fast - 0.6 * (1.0 - fast) * (-t / 60.0).exp()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max_rise(samples: &[f32]) -> f32 {
        samples
            .windows(2)
            .map(|w| w[1] - w[0])
            .fold(f32::MIN, f32::max)
    }

    #[test]
    fn test_every_rhythm_has_a_template() {
        for rhythm in RhythmType::ALL {
            let template = template_for(rhythm);
            assert_eq!(template.rhythm(), rhythm);
            assert!(!template.is_empty());
            assert_eq!(template.len(), template.beats() * BEAT_SAMPLES);
        }
    }

    #[test]
    fn test_templates_are_cached() {
        let first = template_for(RhythmType::Sinus) as *const RhythmTemplate;
        let second = template_for(RhythmType::Sinus) as *const RhythmTemplate;
        assert_eq!(first, second);
    }

    #[test]
    fn test_pacing_cycle_length() {
        assert_eq!(generate_pacing_template(60).len(), 250);
        assert_eq!(generate_pacing_template(70).len(), 214);
        assert_eq!(generate_pacing_template(200).len(), 75);
        assert_eq!(generate_pacing_template(30).len(), 500);
    }

    #[test]
    fn test_pacing_template_has_one_spike() {
        for frequency in [30, 60, 120, 200] {
            let cycle = generate_pacing_template(frequency);
            let spikes = cycle.windows(2).filter(|w| w[1] - w[0] >= 0.4).count();
            assert_eq!(spikes, 1, "frequency {}", frequency);
        }
    }

    #[test]
    fn test_pacing_evoked_complex_stays_below_spike_threshold() {
        let cycle = generate_pacing_template(70);
        let after_spike = &cycle[PACING_SPIKE_OFFSET + 1..];
        assert!(max_rise(after_spike) < 0.4);
    }

    #[test]
    fn test_sinus_waves_outside_qrs_are_shallow() {
        let template = template_for(RhythmType::Sinus).samples();
        // P wave region and T wave region
        assert!(max_rise(&template[..80]) < 0.1);
        assert!(max_rise(&template[120..]) < 0.1);
    }

    #[test]
    fn test_fibrillation_is_deterministic() {
        assert_eq!(ventricular_fibrillation(), ventricular_fibrillation());
    }

    #[test]
    fn test_pleth_template_single_maximum_region() {
        let pleth = pleth_template();
        assert_eq!(pleth.len(), BEAT_SAMPLES);
        let (peak, _) = pleth
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |acc, (i, v)| if *v > acc.1 { (i, *v) } else { acc });
        assert!((60..100).contains(&peak));
    }
}
