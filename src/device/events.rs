// src/device/events.rs
//! Notifications emitted by the state machine

use super::state::DisplayMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeviceEvent {
    ModeChanged { from: DisplayMode, to: DisplayMode },
    BootStarted { target: DisplayMode },
    BootCompleted { mode: DisplayMode },
    BootCancelled,
    ChargeStarted { energy_j: u32 },
    ChargeCompleted { energy_j: u32 },
    ChargeCancelled,
    SynchroModeChanged { enabled: bool },
    /// Shock requested in synchro mode, waiting for the next R-peak
    SynchroArmed,
    /// No R-peak arrived in time; the device stays charged
    SynchroTimedOut,
    ShockDelivered { energy_j: u32, count: u32, synchronized: bool },
    PacingStarted { frequency_ppm: u32, intensity_ma: u32 },
    PacingStopped,
}
