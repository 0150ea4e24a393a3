// src/session/mod.rs
//! Tokio runtime around the simulator core
//!
//! A session owns the device state machine, the waveform synthesizer and the
//! alarm controller behind one mutex. Every surface gets its own frame task
//! and a device-clock task polls the state machine deadlines. Host input goes
//! through the session methods, which lock the core, apply the operation and
//! publish whatever events it produced.
//!
//! All tasks are aborted when their handle or the session is dropped.

use crate::config::{SimulatorConfig, SurfaceConfig};
use crate::device::{
    AlarmController, AudioSink, BootProgress, DeviceEvent, DeviceState, DeviceStateMachine,
    DisplayMode, PatientState, ShockOutcome, Vitals,
};
use crate::error::{DefibError, DefibResult};
use crate::render::{FrameReport, ScrollingRenderer, SignalMode, Surface, ViewOptions};
use crate::rhythm::RhythmType;
use crate::utils::time::{TimeProvider, TokioTimeProvider};
use crate::waveform::{PacerMode, WaveformSnapshot, WaveformSynthesizer};
use crossbeam::channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

/// Which trace a surface shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TraceChannel {
    Ecg,
    Pleth,
}

/// Everything a host needs to draw the panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelState {
    pub time_ms: u64,
    pub device: DeviceState,
    pub patient: PatientState,
    pub vitals: Vitals,
    pub boot: Option<BootProgress>,
    pub synchro_armed: bool,
}

struct SessionCore {
    machine: DeviceStateMachine,
    synthesizer: WaveformSynthesizer,
    alarms: AlarmController,
    audio: Box<dyn AudioSink>,
    rhythm_revealed: bool,
    /// Current rhythm and the session time it started
    onset: (RhythmType, Duration),
    events: Sender<DeviceEvent>,
}

impl SessionCore {
    /// Forward pending events and bring the audio in line with the state
    fn publish(&mut self, now: Duration) {
        for event in self.machine.drain_events() {
            trace!(?event, "device event");
            // nobody listening is fine
            let _ = self.events.send(event);
        }

        let patient = self.machine.patient();
        if patient.rhythm != self.onset.0 {
            self.onset = (patient.rhythm, now);
        }
        let vitals = self.vitals(now);
        self.alarms.update(
            self.machine.mode(),
            patient.rhythm,
            vitals.displayed_heart_rate,
            self.rhythm_revealed,
            self.audio.as_mut(),
        );
    }

    fn vitals(&self, now: Duration) -> Vitals {
        let patient = self.machine.patient();
        Vitals::compute(patient.rhythm, patient.heart_rate, now.saturating_sub(self.onset.1))
    }

    fn frame_inputs(&mut self, channel: TraceChannel) -> (Arc<WaveformSnapshot>, ViewOptions) {
        let mut params = self.machine.waveform_params();
        if !self.rhythm_revealed {
            // nothing acquired yet: no complexes to sync on
            params.rhythm = RhythmType::Asystole;
        }
        let state = self.machine.state();
        let rhythm = self.machine.patient().rhythm;

        let signal_mode = match channel {
            _ if !self.rhythm_revealed => SignalMode::Dotted,
            TraceChannel::Ecg => SignalMode::Trace,
            TraceChannel::Pleth if rhythm.is_pulseless() => SignalMode::FlatLine,
            TraceChannel::Pleth => SignalMode::Trace,
        };
        let view = ViewOptions {
            show_synchro_markers: channel == TraceChannel::Ecg && state.is_synchro_mode,
            signal_mode,
        };

        let snapshot = match channel {
            TraceChannel::Ecg => self.synthesizer.snapshot(&params),
            TraceChannel::Pleth => self.synthesizer.pleth_snapshot(&params),
        };
        (snapshot, view)
    }
}

/// Running simulator
pub struct SimulatorSession {
    config: SimulatorConfig,
    core: Arc<Mutex<SessionCore>>,
    clock: Arc<dyn TimeProvider>,
    events: Receiver<DeviceEvent>,
    device_clock: Option<JoinHandle<()>>,
}

impl SimulatorSession {
    /// Start a session on the current tokio runtime
    pub fn start(config: SimulatorConfig, audio: Box<dyn AudioSink>) -> DefibResult<Self> {
        Self::start_with_clock(config, audio, Arc::new(TokioTimeProvider::new()))
    }

    pub fn start_with_clock(
        config: SimulatorConfig,
        audio: Box<dyn AudioSink>,
        clock: Arc<dyn TimeProvider>,
    ) -> DefibResult<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DefibError::Runtime(format!("no tokio runtime: {}", e)))?;

        let (events_tx, events_rx) = crossbeam::channel::unbounded();
        let core = Arc::new(Mutex::new(SessionCore {
            machine: DeviceStateMachine::new(config.device.clone()),
            synthesizer: WaveformSynthesizer::new(config.clone()),
            alarms: AlarmController::new(),
            audio,
            rhythm_revealed: true,
            onset: (PatientState::default().rhythm, Duration::ZERO),
            events: events_tx,
        }));

        let device_clock = runtime.spawn(run_device_clock(
            Arc::clone(&core),
            Arc::clone(&clock),
            config.device.tick_interval(),
        ));

        info!(
            frame_rate_hz = config.display.frame_rate_hz,
            tick_interval_ms = config.device.tick_interval_ms,
            "simulator session started"
        );
        Ok(Self {
            config,
            core,
            clock,
            events: events_rx,
            device_clock: Some(device_clock),
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Session time
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Device events, in emission order
    pub fn events(&self) -> Receiver<DeviceEvent> {
        self.events.clone()
    }

    /// Attach a surface and start its frame task
    pub fn spawn_surface<S>(&self, surface: Arc<Mutex<S>>, channel: TraceChannel) -> DefibResult<SurfaceHandle>
    where
        S: Surface + Send + 'static,
    {
        let surface_config = self.surface_config(channel);
        let renderer = Arc::new(Mutex::new(ScrollingRenderer::new(
            surface_config,
            self.config.waveform.sampling_rate_hz,
        )?));
        let frames = Arc::new(AtomicU64::new(0));
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DefibError::Runtime(format!("no tokio runtime: {}", e)))?;

        let task = runtime.spawn(run_surface(
            FrameLoop {
                core: Arc::clone(&self.core),
                clock: Arc::clone(&self.clock),
                renderer: Arc::clone(&renderer),
                frames: Arc::clone(&frames),
                channel,
                period: self.config.frame_period(),
            },
            surface,
        ));
        debug!(?channel, "surface attached");

        Ok(SurfaceHandle {
            channel,
            renderer,
            frames,
            task: Some(task),
        })
    }

    fn surface_config(&self, channel: TraceChannel) -> SurfaceConfig {
        match channel {
            TraceChannel::Ecg => self.config.display.ecg.clone(),
            TraceChannel::Pleth => self.config.display.pleth.clone(),
        }
    }

    /// Run `op` on the state machine at the current session time
    pub fn with_machine<R>(&self, op: impl FnOnce(&mut DeviceStateMachine, Duration) -> R) -> R {
        let now = self.now();
        let mut core = self.core.lock();
        let result = op(&mut core.machine, now);
        core.publish(now);
        result
    }

    pub fn set_mode(&self, mode: DisplayMode) {
        self.with_machine(|machine, now| machine.set_mode(mode, now));
    }

    pub fn start_charging(&self) {
        self.with_machine(|machine, now| machine.start_charging(now));
    }

    pub fn cancel_charge(&self) {
        self.with_machine(|machine, _| machine.cancel_charge());
    }

    pub fn deliver_shock(&self) -> ShockOutcome {
        self.with_machine(|machine, now| machine.deliver_shock(now))
    }

    pub fn toggle_synchro(&self) {
        self.with_machine(|machine, _| machine.toggle_synchro());
    }

    pub fn set_manual_energy(&self, energy_j: u32) {
        self.with_machine(|machine, _| machine.set_manual_energy(energy_j));
    }

    pub fn set_pacer_frequency(&self, frequency_ppm: u32) {
        self.with_machine(|machine, _| machine.set_pacer_frequency(frequency_ppm));
    }

    pub fn set_pacer_intensity(&self, intensity_ma: u32) {
        self.with_machine(|machine, _| machine.set_pacer_intensity(intensity_ma));
    }

    pub fn set_pacer_mode(&self, mode: PacerMode) {
        self.with_machine(|machine, _| machine.set_pacer_mode(mode));
    }

    pub fn toggle_pacing(&self) {
        self.with_machine(|machine, _| machine.toggle_pacing());
    }

    pub fn select_channel(&self, channel: u8) {
        self.with_machine(|machine, _| machine.select_channel(channel));
    }

    /// Scenario input
    pub fn set_patient(&self, rhythm: RhythmType, heart_rate: u32) {
        self.with_machine(|machine, _| machine.set_patient(rhythm, heart_rate));
    }

    /// Scenario exit: back to power-on defaults
    pub fn reset(&self) {
        self.with_machine(|machine, _| machine.reset());
    }

    /// Hide the traces behind a dotted baseline until the rhythm is revealed
    pub fn set_rhythm_revealed(&self, revealed: bool) {
        let now = self.now();
        let mut core = self.core.lock();
        core.rhythm_revealed = revealed;
        core.publish(now);
    }

    /// Mute the sounding alarm
    pub fn silence_alarm(&self) {
        let mut core = self.core.lock();
        let SessionCore { alarms, audio, .. } = &mut *core;
        alarms.silence(audio.as_mut());
    }

    pub fn panel_state(&self) -> PanelState {
        let now = self.now();
        let core = self.core.lock();
        let patient = core.machine.patient();
        PanelState {
            time_ms: now.as_millis() as u64,
            device: core.machine.state().clone(),
            patient,
            vitals: core.vitals(now),
            boot: core.machine.boot_progress(now),
            synchro_armed: core.machine.is_synchro_armed(),
        }
    }

    /// Stop the device clock. Surfaces stop when their handles drop.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.device_clock.take() {
            task.abort();
            let mut core = self.core.lock();
            let cancelled = core.machine.timers().active();
            core.machine.reset();
            info!(cancelled_timers = cancelled, "simulator session stopped");
        }
    }
}

impl Drop for SimulatorSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Handle to one surface's frame task
pub struct SurfaceHandle {
    channel: TraceChannel,
    renderer: Arc<Mutex<ScrollingRenderer>>,
    frames: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl SurfaceHandle {
    pub fn channel(&self) -> TraceChannel {
        self.channel
    }

    /// Frames drawn so far
    pub fn frames_rendered(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// New geometry for this surface only; the next frame repaints it
    pub fn resize(&self, width: u32, height: u32) -> DefibResult<()> {
        self.renderer.lock().resize(width, height)
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(channel = ?self.channel, "surface detached");
        }
    }
}

impl Drop for SurfaceHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

struct FrameLoop {
    core: Arc<Mutex<SessionCore>>,
    clock: Arc<dyn TimeProvider>,
    renderer: Arc<Mutex<ScrollingRenderer>>,
    frames: Arc<AtomicU64>,
    channel: TraceChannel,
    period: Duration,
}

impl FrameLoop {
    fn frame<S: Surface>(&self, surface: &Mutex<S>) -> FrameReport {
        let now = self.clock.now();
        let (snapshot, view) = self.core.lock().frame_inputs(self.channel);
        let signal_mode = view.signal_mode;

        let report = {
            let mut surface = surface.lock();
            self.renderer.lock().render_frame(&mut *surface, now, &snapshot, &view)
        };

        if self.channel == TraceChannel::Ecg && signal_mode == SignalMode::Trace && report.crossed_peak() {
            let mut core = self.core.lock();
            if core.machine.on_r_peak(now) {
                core.publish(now);
            }
        }
        self.frames.fetch_add(1, Ordering::Relaxed);
        report
    }
}

async fn run_surface<S: Surface>(frame_loop: FrameLoop, surface: Arc<Mutex<S>>) {
    let mut interval = tokio::time::interval(frame_loop.period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let report = frame_loop.frame(&surface);
        if report.repainted {
            debug!(channel = ?frame_loop.channel, "surface repainted");
        }
    }
}

async fn run_device_clock(core: Arc<Mutex<SessionCore>>, clock: Arc<dyn TimeProvider>, tick: Duration) {
    if tick.is_zero() {
        warn!("device clock disabled: zero tick interval");
        return;
    }
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let now = clock.now();
        let mut core = core.lock();
        core.machine.advance(now);
        core.publish(now);
    }
}
