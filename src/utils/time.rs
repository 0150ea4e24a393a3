// src/utils/time.rs
//! Session clocks
//!
//! Every time-dependent operation in the core takes the current session time
//! as a `Duration` since session start. Hosts obtain it from a `TimeProvider`,
//! which lets tests drive the clock by hand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Time provider trait for dependency injection and testing
pub trait TimeProvider: Send + Sync {
    /// Nanoseconds elapsed since the provider's origin
    fn now_nanos(&self) -> u64;

    fn now(&self) -> Duration {
        Duration::from_nanos(self.now_nanos())
    }
}

/// Monotonic clock anchored at construction
pub struct MonotonicTimeProvider {
    origin: Instant,
}

impl MonotonicTimeProvider {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for MonotonicTimeProvider {
    fn now_nanos(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}

/// Mock time provider for deterministic testing
pub struct MockTimeProvider {
    current_time: AtomicU64,
}

impl MockTimeProvider {
    pub fn new(initial_time_nanos: u64) -> Self {
        Self {
            current_time: AtomicU64::new(initial_time_nanos),
        }
    }

    pub fn advance_by(&self, nanos: u64) {
        self.current_time.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn advance(&self, by: Duration) {
        self.advance_by(by.as_nanos() as u64);
    }

    pub fn set_time(&self, nanos: u64) {
        self.current_time.store(nanos, Ordering::Relaxed);
    }
}

impl TimeProvider for MockTimeProvider {
    fn now_nanos(&self) -> u64 {
        self.current_time.load(Ordering::Relaxed)
    }
}

/// Clock following tokio's time source, so paused-time tests advance it too
#[cfg(feature = "runtime")]
pub struct TokioTimeProvider {
    origin: tokio::time::Instant,
}

#[cfg(feature = "runtime")]
impl TokioTimeProvider {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

#[cfg(feature = "runtime")]
impl Default for TokioTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "runtime")]
impl TimeProvider for TokioTimeProvider {
    fn now_nanos(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_time_provider() {
        let clock = MockTimeProvider::new(0);
        assert_eq!(clock.now(), Duration::ZERO);

        clock.advance(Duration::from_millis(250));
        clock.advance_by(1_000);
        assert_eq!(clock.now_nanos(), 250_001_000);

        clock.set_time(5);
        assert_eq!(clock.now_nanos(), 5);
    }

    #[test]
    fn test_monotonic_provider_never_goes_back() {
        let clock = MonotonicTimeProvider::new();
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
