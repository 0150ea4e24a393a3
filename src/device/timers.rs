// src/device/timers.rs
//! Pending deadlines of the state machine
//!
//! Timers are plain data polled by `DeviceStateMachine::advance`, so
//! cancelling one is just dropping it and nothing can fire after the mode
//! that armed it is gone.

use super::state::DisplayMode;
use std::time::Duration;

/// A deadline started at a known time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub started: Duration,
    pub length: Duration,
}

impl Deadline {
    pub fn new(started: Duration, length: Duration) -> Self {
        Self { started, length }
    }

    pub fn due(&self) -> Duration {
        self.started + self.length
    }

    pub fn elapsed(&self, now: Duration) -> Duration {
        now.saturating_sub(self.started)
    }

    pub fn is_due(&self, now: Duration) -> bool {
        now >= self.due()
    }

    /// Fraction of the deadline elapsed, in `[0, 1]`
    pub fn fraction(&self, now: Duration) -> f64 {
        if self.length.is_zero() {
            return 1.0;
        }
        (self.elapsed(now).as_secs_f64() / self.length.as_secs_f64()).min(1.0)
    }
}

/// Boot sequence towards a live mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootTimer {
    pub target: DisplayMode,
    pub deadline: Deadline,
}

/// Every timer the state machine can have running
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingTimers {
    pub boot: Option<BootTimer>,
    pub charge: Option<Deadline>,
    /// Armed synchronized shock waiting for an R-peak
    pub synchro: Option<Deadline>,
}

impl PendingTimers {
    /// Drop every timer and return how many were running
    pub fn cancel_all(&mut self) -> usize {
        let running = self.active();
        *self = Self::default();
        running
    }

    pub fn active(&self) -> usize {
        self.boot.is_some() as usize + self.charge.is_some() as usize + self.synchro.is_some() as usize
    }

    /// Earliest moment any running timer needs attention
    pub fn next_due(&self) -> Option<Duration> {
        [
            self.boot.map(|b| b.deadline.due()),
            self.charge.map(|c| c.due()),
            self.synchro.map(|s| s.due()),
        ]
        .into_iter()
        .flatten()
        .min()
    }
}
