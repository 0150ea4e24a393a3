// src/device/vitals.rs
//! Vital signs shown next to the traces

use crate::config::constants::vitals::*;
use crate::rhythm::RhythmType;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Heart rate the synthesizer uses for a rhythm.
///
/// Fibrillation rhythms ignore the scenario rate and run fast with a jitter
/// seeded from the scenario rate, so the same inputs always give the same
/// stream and the snapshot cache stays warm.
pub fn synthesis_heart_rate(rhythm: RhythmType, heart_rate: u32) -> u32 {
    match rhythm {
        RhythmType::FibrillationVentriculaire | RhythmType::FibrillationAtriale => {
            let seed = ((rhythm as u64) << 32) | heart_rate as u64;
            let mut rng = StdRng::seed_from_u64(seed);
            let jitter: f32 = rng.gen_range(0.0..FIBRILLATION_RATE_SPAN_BPM);
            (FIBRILLATION_MIN_RATE_BPM + jitter).round() as u32
        }
        _ => heart_rate,
    }
}

/// Numbers and banner displayed by the monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vitals {
    pub displayed_heart_rate: u32,
    pub spo2: Option<u32>,
    pub has_pulse: bool,
    pub alarm_banner: Option<String>,
}

impl Vitals {
    /// Vitals `since_onset` after the rhythm started. Only the FV heart rate
    /// depends on time; its cycle restarts with every new rhythm.
    pub fn compute(rhythm: RhythmType, heart_rate: u32, since_onset: Duration) -> Self {
        let has_pulse = !rhythm.is_pulseless();
        let displayed_heart_rate = match rhythm {
            RhythmType::FibrillationVentriculaire => {
                let slot = since_onset.as_millis() as u64 / FV_DISPLAY_PERIOD_MS;
                FV_DISPLAY_HEART_RATES[slot as usize % FV_DISPLAY_HEART_RATES.len()]
            }
            RhythmType::Asystole => 0,
            _ => heart_rate,
        };
        let spo2 = match rhythm {
            _ if !has_pulse => None,
            RhythmType::FibrillationAtriale => Some(SPO2_ATRIAL_FIBRILLATION_PERCENT),
            _ => Some(SPO2_DEFAULT_PERCENT),
        };
        let alarm_banner = match rhythm {
            RhythmType::FibrillationVentriculaire | RhythmType::FibrillationAtriale => {
                Some(rhythm.label().to_string())
            }
            _ => None,
        };

        Self {
            displayed_heart_rate,
            spo2,
            has_pulse,
            alarm_banner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fibrillation_rate_is_fast_and_stable() {
        for hr in [0, 70, 150] {
            let rate = synthesis_heart_rate(RhythmType::FibrillationVentriculaire, hr);
            assert!((160..=190).contains(&rate));
            assert_eq!(rate, synthesis_heart_rate(RhythmType::FibrillationVentriculaire, hr));
        }
        assert_eq!(synthesis_heart_rate(RhythmType::Sinus, 72), 72);
    }

    #[test]
    fn test_fv_display_cycles_every_two_seconds() {
        let rhythm = RhythmType::FibrillationVentriculaire;
        let at = |ms| Vitals::compute(rhythm, 70, Duration::from_millis(ms)).displayed_heart_rate;
        assert_eq!(at(0), 169);
        assert_eq!(at(1999), 169);
        assert_eq!(at(2000), 170);
        assert_eq!(at(12_000), 190);
        assert_eq!(at(14_000), 169);
    }

    #[test]
    fn test_spo2_and_pulse() {
        let zero = Duration::ZERO;
        let fa = Vitals::compute(RhythmType::FibrillationAtriale, 110, zero);
        assert_eq!(fa.spo2, Some(95));
        assert!(fa.has_pulse);
        assert!(fa.alarm_banner.is_some());

        let tv = Vitals::compute(RhythmType::TachycardieVentriculaire, 180, zero);
        assert_eq!(tv.spo2, None);
        assert!(!tv.has_pulse);
        assert_eq!(tv.displayed_heart_rate, 180);

        let asystole = Vitals::compute(RhythmType::Asystole, 40, zero);
        assert_eq!(asystole.displayed_heart_rate, 0);

        let sinus = Vitals::compute(RhythmType::Sinus, 70, zero);
        assert_eq!(sinus.spo2, Some(92));
        assert_eq!(sinus.alarm_banner, None);
    }
}
