// src/render/scan.rs
//! Per-surface scan position

use std::time::Duration;

/// Mutable scan state of one surface. Never shared between surfaces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanState {
    /// Pixels scanned since the last reset, with sub-pixel carry
    pub accumulator: f64,
    /// Vertical position of the previous trace point
    pub last_y: Option<f32>,
    pub last_frame: Option<Duration>,
}

impl ScanState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Advance by the time elapsed since the previous frame and return the
    /// range of absolute columns crossed. The first frame only anchors time.
    pub fn advance(&mut self, now: Duration, pixels_per_second: f64) -> std::ops::Range<u64> {
        let (elapsed, anchor) = match self.last_frame {
            Some(last) => (now.saturating_sub(last), now.max(last)),
            None => (Duration::ZERO, now),
        };
        self.last_frame = Some(anchor);

        let old_column = self.accumulator.floor() as u64;
        self.accumulator += elapsed.as_secs_f64() * pixels_per_second;
        let new_column = self.accumulator.floor() as u64;
        old_column..new_column
    }

    /// Current scan column on a surface of `width` pixels
    pub fn scan_x(&self, width: u32) -> u32 {
        if width == 0 {
            0
        } else {
            (self.accumulator.floor() as u64 % width as u64) as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_anchors_time() {
        let mut scan = ScanState::default();
        assert!(scan.advance(Duration::from_secs(10), 100.0).is_empty());
        assert_eq!(scan.last_frame, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_sub_pixel_carry() {
        let mut scan = ScanState::default();
        scan.advance(Duration::ZERO, 100.0);

        // 4 ms at 100 px/s is 0.4 px per frame
        let mut crossed = 0;
        for frame in 1..=3 {
            crossed += scan.advance(Duration::from_millis(4 * frame), 100.0).count();
        }
        assert_eq!(crossed, 1);
        assert!((scan.accumulator - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_time_going_backwards_does_not_rewind() {
        let mut scan = ScanState::default();
        scan.advance(Duration::from_secs(1), 100.0);
        scan.advance(Duration::from_secs(2), 100.0);
        let before = scan.accumulator;
        assert!(scan.advance(Duration::from_millis(1500), 100.0).is_empty());
        assert_eq!(scan.accumulator, before);
    }

    #[test]
    fn test_reset() {
        let mut scan = ScanState {
            accumulator: 42.5,
            last_y: Some(3.0),
            last_frame: Some(Duration::from_secs(1)),
        };
        scan.reset();
        assert_eq!(scan, ScanState::default());
        assert_eq!(scan.scan_x(800), 0);
    }
}
