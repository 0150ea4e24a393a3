// src/device/mod.rs
//! Device state machine, vitals and audio sequencing

pub mod alarms;
pub mod events;
pub mod machine;
pub mod state;
pub mod timers;
pub mod vitals;

pub use alarms::{AlarmController, AlarmKind, AudioCommand, AudioSink, AudioState, ChannelAudioSink, NullAudioSink};
pub use events::DeviceEvent;
pub use machine::{BootProgress, DeviceStateMachine, ShockOutcome};
pub use state::{ChargePhase, DeviceState, DisplayMode, PatientState};
pub use timers::{BootTimer, Deadline, PendingTimers};
pub use vitals::{synthesis_heart_rate, Vitals};
