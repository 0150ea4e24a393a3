// src/device/state.rs
//! Device state owned by the state machine

use crate::config::constants::device;
use crate::config::DeviceConfig;
use crate::rhythm::RhythmType;
use crate::utils::bounds::{clamp_to_step, snap_to_level};
use crate::waveform::PacerMode;
use serde::{Deserialize, Serialize};

/// Operating mode selected on the front-panel dial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DisplayMode {
    #[default]
    Off,
    Aed,
    Monitor,
    Manual,
    Pacing,
}

impl DisplayMode {
    pub fn is_live(self) -> bool {
        self != DisplayMode::Off
    }
}

/// Stage of the manual charge lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargePhase {
    Idle,
    Charging,
    Charged,
}

/// Everything the panel shows about the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub display_mode: DisplayMode,
    /// 0 to 100, exactly 100 once charged
    pub charge_progress: f32,
    pub is_charging: bool,
    pub is_charged: bool,
    pub shock_count: u32,
    pub is_synchro_mode: bool,
    /// Joules, always a member of the energy dial
    pub manual_energy: u32,
    pub pacer_frequency: u32,
    pub pacer_intensity: u32,
    pub pacer_mode: PacerMode,
    pub is_pacing: bool,
    pub selected_channel: u8,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::from_config(&DeviceConfig::default())
    }
}

impl DeviceState {
    /// Power-on state with the configured defaults, clamped into range
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self {
            display_mode: DisplayMode::Off,
            charge_progress: 0.0,
            is_charging: false,
            is_charged: false,
            shock_count: 0,
            is_synchro_mode: false,
            manual_energy: snap_to_level(config.default_energy_j, &device::ENERGY_LEVELS_J),
            pacer_frequency: config
                .default_pacer_frequency_ppm
                .clamp(device::MIN_PACER_FREQUENCY_PPM, device::MAX_PACER_FREQUENCY_PPM),
            pacer_intensity: clamp_to_step(
                config.default_pacer_intensity_ma,
                device::MIN_PACER_INTENSITY_MA,
                device::MAX_PACER_INTENSITY_MA,
                device::PACER_INTENSITY_STEP_MA,
            ),
            pacer_mode: PacerMode::Fixed,
            is_pacing: false,
            selected_channel: device::DEFAULT_CHANNEL,
        }
    }

    pub fn charge_phase(&self) -> ChargePhase {
        if self.is_charging {
            ChargePhase::Charging
        } else if self.is_charged {
            ChargePhase::Charged
        } else {
            ChargePhase::Idle
        }
    }

    pub(crate) fn clear_charge(&mut self) {
        self.charge_progress = 0.0;
        self.is_charging = false;
        self.is_charged = false;
    }
}

/// Patient parameters written by the scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientState {
    pub rhythm: RhythmType,
    pub heart_rate: u32,
}

impl Default for PatientState {
    fn default() -> Self {
        Self {
            rhythm: RhythmType::Sinus,
            heart_rate: crate::config::constants::waveform::DEFAULT_HEART_RATE_BPM as u32,
        }
    }
}
