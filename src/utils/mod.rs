//! Common utilities for the simulator core
//!
//! - Session clocks with a mockable time source
//! - Clamp, step and snap helpers for device setters

pub mod bounds;
pub mod time;

pub use bounds::{adjacent_level, clamp_to_step, snap_to_level, step_within};
pub use time::{MockTimeProvider, MonotonicTimeProvider, TimeProvider};

#[cfg(feature = "runtime")]
pub use time::TokioTimeProvider;
