// src/waveform/detector.rs
//! R-peak and pacing-spike detection

use crate::config::DetectionConfig;
use std::collections::BTreeSet;

/// Sorted set of sample indices into one waveform stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventIndexSet {
    indices: BTreeSet<usize>,
}

impl EventIndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: usize) -> bool {
        self.indices.insert(index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    /// Whether any index falls in `start..end`
    pub fn any_in(&self, start: usize, end: usize) -> bool {
        self.in_range(start, end).next().is_some()
    }

    /// Indices in `start..end`, ascending
    pub fn in_range(&self, start: usize, end: usize) -> impl Iterator<Item = usize> + '_ {
        let end = end.max(start);
        self.indices.range(start..end).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Smallest distance between two consecutive indices
    pub fn min_separation(&self) -> Option<usize> {
        self.indices
            .iter()
            .zip(self.indices.iter().skip(1))
            .map(|(a, b)| b - a)
            .min()
    }
}

impl FromIterator<usize> for EventIndexSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self {
            indices: iter.into_iter().collect(),
        }
    }
}

/// Locate R-peaks with a single forward pass over first differences.
///
/// A difference steeper than the slope threshold opens a search window; the
/// highest sample in that window is recorded and the cursor jumps past the
/// refractory period, so consecutive peaks are always more than
/// `refractory_samples` apart.
pub fn detect_peaks(samples: &[f32], config: &DetectionConfig) -> EventIndexSet {
    let mut peaks = EventIndexSet::new();
    let mut i = 1;

    while i < samples.len() {
        if (samples[i] - samples[i - 1]).abs() > config.slope_threshold {
            let window_end = (i + config.search_window).min(samples.len());
            let mut peak_index = i;
            for j in i + 1..window_end {
                if samples[j] > samples[peak_index] {
                    peak_index = j;
                }
            }

            peaks.insert(peak_index);
            i = peak_index + config.refractory_samples;
        }
        i += 1;
    }

    peaks
}

/// Indices where the signal rises by at least the spike threshold in one sample
pub fn detect_pacing_spikes(samples: &[f32], config: &DetectionConfig) -> EventIndexSet {
    samples
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[1] - w[0] >= config.spike_delta)
        .map(|(i, _)| i + 1)
        .collect()
}

/// Evenly spaced stimulation marks, first one after a full interval
pub fn synthetic_spikes(stream_len: usize, interval: usize) -> EventIndexSet {
    if interval == 0 {
        return EventIndexSet::new();
    }
    (interval..stream_len).step_by(interval).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DetectionConfig {
        DetectionConfig::default()
    }

    fn impulse_train(len: usize, every: usize) -> Vec<f32> {
        (0..len).map(|i| if i % every == 10 { 1.0 } else { 0.0 }).collect()
    }

    #[test]
    fn test_detects_isolated_peaks() {
        let samples = impulse_train(500, 100);
        let peaks = detect_peaks(&samples, &config());
        assert_eq!(peaks.iter().collect::<Vec<_>>(), vec![10, 110, 210, 310, 410]);
    }

    #[test]
    fn test_refractory_suppresses_close_peaks() {
        let mut samples = vec![0.0; 200];
        samples[20] = 1.0;
        samples[40] = 1.0;
        samples[100] = 1.0;

        let peaks = detect_peaks(&samples, &config());
        assert_eq!(peaks.iter().collect::<Vec<_>>(), vec![20, 100]);
        assert!(peaks.min_separation().unwrap() > 38);
    }

    #[test]
    fn test_search_window_finds_apex() {
        let mut samples = vec![0.0; 100];
        for (offset, value) in [0.2, 0.4, 0.7, 1.0, 0.6, 0.2].iter().enumerate() {
            samples[30 + offset] = *value;
        }
        let peaks = detect_peaks(&samples, &config());
        assert_eq!(peaks.iter().collect::<Vec<_>>(), vec![33]);
    }

    #[test]
    fn test_flat_signal_has_no_peaks() {
        let samples = vec![0.05; 300];
        assert!(detect_peaks(&samples, &config()).is_empty());
        assert!(detect_peaks(&[], &config()).is_empty());
    }

    #[test]
    fn test_pacing_spikes_need_steep_rise() {
        let samples = vec![0.0, 0.39, 0.0, 0.4, 0.4, 1.2, 0.0];
        let spikes = detect_pacing_spikes(&samples, &config());
        assert_eq!(spikes.iter().collect::<Vec<_>>(), vec![3, 5]);
    }

    #[test]
    fn test_synthetic_spikes() {
        let spikes = synthetic_spikes(1000, 214);
        assert_eq!(spikes.iter().collect::<Vec<_>>(), vec![214, 428, 642, 856]);
        assert!(synthetic_spikes(100, 0).is_empty());
    }

    #[test]
    fn test_any_in_range() {
        let set: EventIndexSet = [10, 50].into_iter().collect();
        assert!(set.any_in(8, 11));
        assert!(!set.any_in(11, 50));
        assert!(!set.any_in(20, 20));
    }
}
