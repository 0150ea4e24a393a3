// src/device/alarms.rs
//! Alarm and QRS beep sequencing
//!
//! The controller only decides *what* should sound; playing it is left to an
//! [`AudioSink`] supplied by the host.

use super::state::DisplayMode;
use crate::rhythm::RhythmType;
use crossbeam::channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmKind {
    VentricularFibrillation,
    AtrialFibrillation,
    VentricularTachycardia,
    Asystole,
}

impl AlarmKind {
    pub fn for_rhythm(rhythm: RhythmType) -> Option<Self> {
        match rhythm {
            RhythmType::FibrillationVentriculaire => Some(AlarmKind::VentricularFibrillation),
            RhythmType::FibrillationAtriale => Some(AlarmKind::AtrialFibrillation),
            RhythmType::TachycardieVentriculaire => Some(AlarmKind::VentricularTachycardia),
            RhythmType::Asystole => Some(AlarmKind::Asystole),
            _ => None,
        }
    }
}

/// Host-side audio output
pub trait AudioSink: Send {
    fn start_alarm(&mut self, kind: AlarmKind);
    fn stop_alarm(&mut self, kind: AlarmKind);
    fn start_beep(&mut self, heart_rate: u32);
    fn stop_beep(&mut self);
}

/// Sink that discards every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudioSink;

impl AudioSink for NullAudioSink {
    fn start_alarm(&mut self, _kind: AlarmKind) {}
    fn stop_alarm(&mut self, _kind: AlarmKind) {}
    fn start_beep(&mut self, _heart_rate: u32) {}
    fn stop_beep(&mut self) {}
}

/// One audio notification, as sent by [`ChannelAudioSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum AudioCommand {
    StartAlarm { kind: AlarmKind },
    StopAlarm { kind: AlarmKind },
    StartBeep { heart_rate: u32 },
    StopBeep,
}

/// Forwards notifications to another thread over a channel
pub struct ChannelAudioSink {
    tx: Sender<AudioCommand>,
}

impl ChannelAudioSink {
    pub fn new() -> (Self, Receiver<AudioCommand>) {
        let (tx, rx) = crossbeam::channel::unbounded();
        (Self { tx }, rx)
    }

    fn send(&self, command: AudioCommand) {
        // receiver gone means nobody is listening any more
        let _ = self.tx.send(command);
    }
}

impl AudioSink for ChannelAudioSink {
    fn start_alarm(&mut self, kind: AlarmKind) {
        self.send(AudioCommand::StartAlarm { kind });
    }

    fn stop_alarm(&mut self, kind: AlarmKind) {
        self.send(AudioCommand::StopAlarm { kind });
    }

    fn start_beep(&mut self, heart_rate: u32) {
        self.send(AudioCommand::StartBeep { heart_rate });
    }

    fn stop_beep(&mut self) {
        self.send(AudioCommand::StopBeep);
    }
}

/// What the speaker is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioState {
    #[default]
    Silent,
    Alarm(AlarmKind),
    Beep(u32),
}

#[derive(Debug, Default)]
pub struct AlarmController {
    current: AudioState,
    /// Alarm acknowledged by the user, muted until the condition changes
    silenced: Option<AlarmKind>,
}

impl AlarmController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> AudioState {
        self.current
    }

    /// Re-evaluate the audio for the current device and patient state.
    ///
    /// While the rhythm is hidden the monitor only beeps at the heart rate;
    /// once revealed, alarmable rhythms sound their alarm and the rest are
    /// silent.
    pub fn update(
        &mut self,
        mode: DisplayMode,
        rhythm: RhythmType,
        heart_rate: u32,
        rhythm_revealed: bool,
        sink: &mut dyn AudioSink,
    ) {
        let alarm = AlarmKind::for_rhythm(rhythm).filter(|_| rhythm_revealed);
        if self.silenced.is_some() && self.silenced != alarm {
            self.silenced = None;
        }

        let wanted = match alarm {
            _ if !mode.is_live() => AudioState::Silent,
            _ if !rhythm_revealed && heart_rate > 0 => AudioState::Beep(heart_rate),
            Some(kind) if self.silenced != Some(kind) => AudioState::Alarm(kind),
            _ => AudioState::Silent,
        };
        self.transition(wanted, sink);
    }

    /// Mute the alarm that is sounding now
    pub fn silence(&mut self, sink: &mut dyn AudioSink) {
        if let AudioState::Alarm(kind) = self.current {
            info!(?kind, "alarm silenced");
            self.silenced = Some(kind);
            self.transition(AudioState::Silent, sink);
        }
    }

    fn transition(&mut self, wanted: AudioState, sink: &mut dyn AudioSink) {
        if wanted == self.current {
            return;
        }
        debug!(from = ?self.current, to = ?wanted, "audio transition");

        match self.current {
            AudioState::Alarm(kind) => sink.stop_alarm(kind),
            AudioState::Beep(_) if !matches!(wanted, AudioState::Beep(_)) => sink.stop_beep(),
            _ => {}
        }
        match wanted {
            AudioState::Alarm(kind) => {
                info!(?kind, "alarm raised");
                sink.start_alarm(kind);
            }
            AudioState::Beep(heart_rate) => sink.start_beep(heart_rate),
            AudioState::Silent => {}
        }
        self.current = wanted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commands(rx: &Receiver<AudioCommand>) -> Vec<AudioCommand> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_transitions_only() {
        let (mut sink, rx) = ChannelAudioSink::new();
        let mut alarms = AlarmController::new();

        alarms.update(DisplayMode::Monitor, RhythmType::Sinus, 70, false, &mut sink);
        alarms.update(DisplayMode::Monitor, RhythmType::Sinus, 70, false, &mut sink);
        assert_eq!(commands(&rx), vec![AudioCommand::StartBeep { heart_rate: 70 }]);

        alarms.update(DisplayMode::Monitor, RhythmType::FibrillationVentriculaire, 70, true, &mut sink);
        assert_eq!(
            commands(&rx),
            vec![
                AudioCommand::StopBeep,
                AudioCommand::StartAlarm { kind: AlarmKind::VentricularFibrillation },
            ]
        );

        alarms.update(DisplayMode::Off, RhythmType::FibrillationVentriculaire, 70, true, &mut sink);
        assert_eq!(
            commands(&rx),
            vec![AudioCommand::StopAlarm { kind: AlarmKind::VentricularFibrillation }]
        );
        assert_eq!(alarms.current(), AudioState::Silent);
    }

    #[test]
    fn test_beep_follows_heart_rate() {
        let (mut sink, rx) = ChannelAudioSink::new();
        let mut alarms = AlarmController::new();
        alarms.update(DisplayMode::Manual, RhythmType::Bav1, 60, false, &mut sink);
        alarms.update(DisplayMode::Manual, RhythmType::Bav1, 80, false, &mut sink);
        assert_eq!(
            commands(&rx),
            vec![
                AudioCommand::StartBeep { heart_rate: 60 },
                AudioCommand::StartBeep { heart_rate: 80 },
            ]
        );
    }

    #[test]
    fn test_silence_until_condition_changes() {
        let (mut sink, rx) = ChannelAudioSink::new();
        let mut alarms = AlarmController::new();
        alarms.update(DisplayMode::Monitor, RhythmType::Asystole, 0, true, &mut sink);
        alarms.silence(&mut sink);
        alarms.update(DisplayMode::Monitor, RhythmType::Asystole, 0, true, &mut sink);
        assert_eq!(alarms.current(), AudioState::Silent);

        alarms.update(DisplayMode::Monitor, RhythmType::TachycardieVentriculaire, 180, true, &mut sink);
        assert_eq!(
            commands(&rx).last(),
            Some(&AudioCommand::StartAlarm { kind: AlarmKind::VentricularTachycardia })
        );
    }

    #[test]
    fn test_null_sink_accepts_everything() {
        let mut alarms = AlarmController::new();
        alarms.update(DisplayMode::Aed, RhythmType::FibrillationAtriale, 110, true, &mut NullAudioSink);
        assert_eq!(alarms.current(), AudioState::Alarm(AlarmKind::AtrialFibrillation));
    }

    #[test]
    fn test_hidden_rhythm_only_beeps() {
        let (mut sink, rx) = ChannelAudioSink::new();
        let mut alarms = AlarmController::new();
        alarms.update(DisplayMode::Monitor, RhythmType::FibrillationVentriculaire, 169, false, &mut sink);
        assert_eq!(commands(&rx), vec![AudioCommand::StartBeep { heart_rate: 169 }]);

        alarms.update(DisplayMode::Monitor, RhythmType::FibrillationVentriculaire, 169, true, &mut sink);
        assert_eq!(
            commands(&rx),
            vec![
                AudioCommand::StopBeep,
                AudioCommand::StartAlarm { kind: AlarmKind::VentricularFibrillation },
            ]
        );
    }

    #[test]
    fn test_revealed_normal_rhythm_is_silent() {
        let (mut sink, rx) = ChannelAudioSink::new();
        let mut alarms = AlarmController::new();
        alarms.update(DisplayMode::Manual, RhythmType::Sinus, 70, true, &mut sink);
        assert_eq!(alarms.current(), AudioState::Silent);
        assert!(commands(&rx).is_empty());

        // hiding it again brings the beep back
        alarms.update(DisplayMode::Manual, RhythmType::Sinus, 70, false, &mut sink);
        assert_eq!(alarms.current(), AudioState::Beep(70));
    }
}
