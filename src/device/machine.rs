// src/device/machine.rs
//! Device state machine
//!
//! All mutation of [`DeviceState`] goes through the operations below. Time is
//! passed in explicitly as the session time, and pending work (boot, charge,
//! armed synchronized shock) is kept as deadlines that [`advance`] polls.
//! Operations that do not apply in the current mode leave the state alone.
//!
//! [`advance`]: DeviceStateMachine::advance

use super::events::DeviceEvent;
use super::state::{ChargePhase, DeviceState, DisplayMode, PatientState};
use super::timers::{BootTimer, Deadline, PendingTimers};
use super::vitals;
use crate::config::constants::{device, waveform};
use crate::config::DeviceConfig;
use crate::rhythm::RhythmType;
use crate::utils::bounds::{adjacent_level, clamp_to_step, snap_to_level, step_within};
use crate::waveform::{PacerMode, PacingParams, WaveformParams};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of pressing the shock button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShockOutcome {
    Delivered,
    /// Synchro mode: delivery waits for the next R-peak
    Armed,
    /// Not charged, wrong mode, or already armed
    Ignored,
}

/// Boot screen progress
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BootProgress {
    pub target: DisplayMode,
    pub percent: f32,
}

pub struct DeviceStateMachine {
    config: DeviceConfig,
    state: DeviceState,
    patient: PatientState,
    timers: PendingTimers,
    events: Vec<DeviceEvent>,
}

impl DeviceStateMachine {
    pub fn new(config: DeviceConfig) -> Self {
        let state = DeviceState::from_config(&config);
        Self {
            config,
            state,
            patient: PatientState::default(),
            timers: PendingTimers::default(),
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn patient(&self) -> PatientState {
        self.patient
    }

    pub fn timers(&self) -> &PendingTimers {
        &self.timers
    }

    pub fn is_booting(&self) -> bool {
        self.timers.boot.is_some()
    }

    pub fn is_synchro_armed(&self) -> bool {
        self.timers.synchro.is_some()
    }

    pub fn mode(&self) -> DisplayMode {
        self.state.display_mode
    }

    /// Take the events emitted since the last call
    pub fn drain_events(&mut self) -> Vec<DeviceEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, event: DeviceEvent) {
        self.events.push(event);
    }

    // Mode handling

    /// Turn the dial. Off always wins and resets the device; leaving Off
    /// starts the boot sequence, during which other targets are ignored.
    pub fn set_mode(&mut self, mode: DisplayMode, now: Duration) {
        if mode == DisplayMode::Off {
            self.power_off();
            return;
        }
        if self.is_booting() {
            debug!(target_mode = ?mode, "mode change ignored while booting");
            return;
        }

        let from = self.state.display_mode;
        if from == mode {
            return;
        }

        if from == DisplayMode::Off {
            self.timers.boot = Some(BootTimer {
                target: mode,
                deadline: Deadline::new(now, self.config.boot_duration()),
            });
            info!(target_mode = ?mode, "boot started");
            self.emit(DeviceEvent::BootStarted { target: mode });
            return;
        }

        self.abandon_charge();
        if from == DisplayMode::Pacing {
            self.stop_pacing();
        }
        self.state.display_mode = mode;
        info!(from = ?from, to = ?mode, "mode changed");
        self.emit(DeviceEvent::ModeChanged { from, to: mode });
    }

    fn power_off(&mut self) {
        let from = self.state.display_mode;
        let was_booting = self.is_booting();
        self.reset();

        if was_booting {
            self.emit(DeviceEvent::BootCancelled);
        }
        if from != DisplayMode::Off {
            info!(from = ?from, "device switched off");
            self.emit(DeviceEvent::ModeChanged { from, to: DisplayMode::Off });
        }
    }

    /// Restore every default and cancel all pending timers. Used on
    /// power-off and when a scenario ends.
    pub fn reset(&mut self) {
        let cancelled = self.timers.cancel_all();
        if cancelled > 0 {
            debug!(cancelled, "pending timers cancelled");
        }
        self.state = DeviceState::from_config(&self.config);
    }

    pub fn boot_progress(&self, now: Duration) -> Option<BootProgress> {
        let boot = self.timers.boot?;
        let step_ms = device::BOOT_PROGRESS_STEP_MS;
        let total_ms = self.config.boot_duration_ms.max(step_ms);
        let steps = boot.deadline.elapsed(now).as_millis() as u64 / step_ms;
        let percent = ((steps * step_ms) as f32 * 100.0 / total_ms as f32).min(100.0);
        Some(BootProgress {
            target: boot.target,
            percent,
        })
    }

    /// Fire every deadline reached by `now`
    pub fn advance(&mut self, now: Duration) {
        if let Some(boot) = self.timers.boot {
            if boot.deadline.is_due(now) {
                self.timers.boot = None;
                self.state.display_mode = boot.target;
                info!(mode = ?boot.target, "boot completed");
                self.emit(DeviceEvent::BootCompleted { mode: boot.target });
                self.emit(DeviceEvent::ModeChanged {
                    from: DisplayMode::Off,
                    to: boot.target,
                });
            }
        }

        if let Some(charge) = self.timers.charge {
            if charge.is_due(now) {
                self.timers.charge = None;
                self.state.charge_progress = device::CHARGE_COMPLETE_PERCENT;
                self.state.is_charging = false;
                self.state.is_charged = true;
                info!(energy_j = self.state.manual_energy, "charge complete");
                self.emit(DeviceEvent::ChargeCompleted {
                    energy_j: self.state.manual_energy,
                });
            } else {
                let progress = (charge.fraction(now) * 100.0) as f32;
                // never reported as complete before the deadline
                self.state.charge_progress = progress.clamp(self.state.charge_progress, 99.99);
            }
        }

        if let Some(synchro) = self.timers.synchro {
            if synchro.is_due(now) {
                self.timers.synchro = None;
                warn!(
                    timeout_ms = synchro.length.as_millis() as u64,
                    "no R-peak before synchro timeout, shock not delivered"
                );
                self.emit(DeviceEvent::SynchroTimedOut);
            }
        }
    }

    // Charge and shock

    /// Start charging at the selected energy. Manual mode, idle only.
    pub fn start_charging(&mut self, now: Duration) {
        if self.state.display_mode != DisplayMode::Manual
            || self.state.charge_phase() != ChargePhase::Idle
        {
            return;
        }
        self.state.is_charging = true;
        self.state.charge_progress = 0.0;
        self.state.selected_channel = device::CHARGE_CHANNEL;
        self.timers.charge = Some(Deadline::new(now, self.config.charge_duration()));
        info!(energy_j = self.state.manual_energy, "charging");
        self.emit(DeviceEvent::ChargeStarted {
            energy_j: self.state.manual_energy,
        });
    }

    /// Dump the charge from Charging or Charged
    pub fn cancel_charge(&mut self) {
        if self.state.charge_phase() == ChargePhase::Idle {
            return;
        }
        self.abandon_charge();
    }

    fn abandon_charge(&mut self) {
        let had_charge = self.state.charge_phase() != ChargePhase::Idle;
        self.timers.charge = None;
        self.timers.synchro = None;
        self.state.clear_charge();
        if had_charge {
            info!("charge cancelled");
            self.emit(DeviceEvent::ChargeCancelled);
        }
    }

    /// Press the shock button. Outside synchro mode a charged device fires
    /// immediately; in synchro mode the shock is armed and fires on the next
    /// R-peak reported through [`on_r_peak`](Self::on_r_peak).
    pub fn deliver_shock(&mut self, now: Duration) -> ShockOutcome {
        if self.state.display_mode != DisplayMode::Manual {
            return ShockOutcome::Ignored;
        }
        self.state.selected_channel = device::SHOCK_CHANNEL;
        if self.state.charge_phase() != ChargePhase::Charged {
            return ShockOutcome::Ignored;
        }

        if self.state.is_synchro_mode {
            if self.is_synchro_armed() {
                return ShockOutcome::Ignored;
            }
            self.timers.synchro = Some(Deadline::new(now, self.config.synchro_timeout()));
            debug!("synchronized shock armed");
            self.emit(DeviceEvent::SynchroArmed);
            return ShockOutcome::Armed;
        }

        self.fire(false);
        ShockOutcome::Delivered
    }

    /// An R-peak was displayed. Delivers an armed synchronized shock.
    pub fn on_r_peak(&mut self, now: Duration) -> bool {
        match self.timers.synchro {
            Some(armed) if !armed.is_due(now) && self.state.is_charged => {
                self.fire(true);
                true
            }
            _ => false,
        }
    }

    fn fire(&mut self, synchronized: bool) {
        self.timers.synchro = None;
        self.state.shock_count += 1;
        self.state.clear_charge();
        info!(
            energy_j = self.state.manual_energy,
            count = self.state.shock_count,
            synchronized,
            "shock delivered"
        );
        self.emit(DeviceEvent::ShockDelivered {
            energy_j: self.state.manual_energy,
            count: self.state.shock_count,
            synchronized,
        });
    }

    pub fn toggle_synchro(&mut self) {
        if !self.state.display_mode.is_live() {
            return;
        }
        self.state.is_synchro_mode = !self.state.is_synchro_mode;
        if !self.state.is_synchro_mode && self.timers.synchro.take().is_some() {
            debug!("armed synchronized shock dropped");
        }
        self.emit(DeviceEvent::SynchroModeChanged {
            enabled: self.state.is_synchro_mode,
        });
    }

    /// Select an energy from the dial; other values snap to the nearest one
    pub fn set_manual_energy(&mut self, energy_j: u32) {
        if self.state.display_mode != DisplayMode::Manual || self.state.is_charging {
            return;
        }
        self.state.manual_energy = snap_to_level(energy_j, &device::ENERGY_LEVELS_J);
    }

    pub fn step_manual_energy(&mut self, up: bool) {
        let next = adjacent_level(self.state.manual_energy, &device::ENERGY_LEVELS_J, up);
        self.set_manual_energy(next);
    }

    pub fn select_channel(&mut self, channel: u8) {
        if !self.state.display_mode.is_live() {
            return;
        }
        self.state.selected_channel = channel.clamp(device::MIN_CHANNEL, device::MAX_CHANNEL);
    }

    // Pacing

    fn in_pacing_mode(&self) -> bool {
        self.state.display_mode == DisplayMode::Pacing
    }

    pub fn set_pacer_frequency(&mut self, frequency_ppm: u32) {
        if !self.in_pacing_mode() {
            return;
        }
        self.state.pacer_frequency =
            frequency_ppm.clamp(device::MIN_PACER_FREQUENCY_PPM, device::MAX_PACER_FREQUENCY_PPM);
    }

    pub fn set_pacer_intensity(&mut self, intensity_ma: u32) {
        if !self.in_pacing_mode() {
            return;
        }
        self.state.pacer_intensity = clamp_to_step(
            intensity_ma,
            device::MIN_PACER_INTENSITY_MA,
            device::MAX_PACER_INTENSITY_MA,
            device::PACER_INTENSITY_STEP_MA,
        );
    }

    pub fn step_pacer_frequency(&mut self, up: bool) {
        let next = step_within(
            self.state.pacer_frequency,
            device::MIN_PACER_FREQUENCY_PPM,
            device::MAX_PACER_FREQUENCY_PPM,
            device::PACER_FREQUENCY_STEP_PPM,
            up,
        );
        self.set_pacer_frequency(next);
    }

    pub fn step_pacer_intensity(&mut self, up: bool) {
        let next = step_within(
            self.state.pacer_intensity,
            device::MIN_PACER_INTENSITY_MA,
            device::MAX_PACER_INTENSITY_MA,
            device::PACER_INTENSITY_STEP_MA,
            up,
        );
        self.set_pacer_intensity(next);
    }

    pub fn set_pacer_mode(&mut self, mode: PacerMode) {
        if self.in_pacing_mode() {
            self.state.pacer_mode = mode;
        }
    }

    pub fn toggle_pacing(&mut self) {
        if !self.in_pacing_mode() {
            return;
        }
        if self.state.is_pacing {
            self.stop_pacing();
        } else {
            self.state.is_pacing = true;
            info!(
                frequency_ppm = self.state.pacer_frequency,
                intensity_ma = self.state.pacer_intensity,
                "pacing started"
            );
            self.emit(DeviceEvent::PacingStarted {
                frequency_ppm: self.state.pacer_frequency,
                intensity_ma: self.state.pacer_intensity,
            });
        }
    }

    fn stop_pacing(&mut self) {
        if self.state.is_pacing {
            self.state.is_pacing = false;
            info!("pacing stopped");
            self.emit(DeviceEvent::PacingStopped);
        }
    }

    // Patient

    /// Scenario input: the patient's rhythm and intrinsic heart rate
    pub fn set_patient(&mut self, rhythm: RhythmType, heart_rate: u32) {
        let heart_rate = heart_rate.min(waveform::MAX_HEART_RATE_BPM as u32);
        let patient = PatientState { rhythm, heart_rate };
        if patient != self.patient {
            debug!(rhythm = %rhythm, heart_rate, "patient updated");
            self.patient = patient;
        }
    }

    /// Parameters the synthesizer needs for the current state
    pub fn waveform_params(&self) -> WaveformParams {
        WaveformParams {
            rhythm: self.patient.rhythm,
            heart_rate: vitals::synthesis_heart_rate(self.patient.rhythm, self.patient.heart_rate),
            pacing: PacingParams {
                is_pacing: self.state.is_pacing && self.in_pacing_mode(),
                frequency_ppm: self.state.pacer_frequency,
                intensity_ma: self.state.pacer_intensity,
                mode: self.state.pacer_mode,
            },
        }
    }
}
