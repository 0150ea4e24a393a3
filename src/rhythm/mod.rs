// src/rhythm/mod.rs
//! Cardiac rhythm catalogue and template library

pub mod templates;

pub use templates::{generate_pacing_template, pleth_template, template_for, RhythmTemplate};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rhythms the simulator can display
///
/// Serialized with the scenario-file spelling (`fibrillationVentriculaire`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum RhythmType {
    #[default]
    Sinus,
    Bav1,
    Bav3,
    FibrillationVentriculaire,
    FibrillationAtriale,
    TachycardieVentriculaire,
    Asystole,
    ElectroEntrainement,
    Choc,
}

impl RhythmType {
    pub const ALL: [RhythmType; 9] = [
        RhythmType::Sinus,
        RhythmType::Bav1,
        RhythmType::Bav3,
        RhythmType::FibrillationVentriculaire,
        RhythmType::FibrillationAtriale,
        RhythmType::TachycardieVentriculaire,
        RhythmType::Asystole,
        RhythmType::ElectroEntrainement,
        RhythmType::Choc,
    ];

    /// Human-readable label for monitor displays
    pub fn label(self) -> &'static str {
        match self {
            RhythmType::Sinus => "Sinus rhythm",
            RhythmType::Bav1 => "First-degree AV block",
            RhythmType::Bav3 => "Third-degree AV block",
            RhythmType::FibrillationVentriculaire => "Ventricular fibrillation",
            RhythmType::FibrillationAtriale => "Atrial fibrillation",
            RhythmType::TachycardieVentriculaire => "Ventricular tachycardia",
            RhythmType::Asystole => "Asystole",
            RhythmType::ElectroEntrainement => "Paced rhythm",
            RhythmType::Choc => "Shock artefact",
        }
    }

    /// Scenario-file identifier
    pub fn identifier(self) -> &'static str {
        match self {
            RhythmType::Sinus => "sinus",
            RhythmType::Bav1 => "bav1",
            RhythmType::Bav3 => "bav3",
            RhythmType::FibrillationVentriculaire => "fibrillationVentriculaire",
            RhythmType::FibrillationAtriale => "fibrillationAtriale",
            RhythmType::TachycardieVentriculaire => "tachycardieVentriculaire",
            RhythmType::Asystole => "asystole",
            RhythmType::ElectroEntrainement => "electroEntrainement",
            RhythmType::Choc => "choc",
        }
    }

    /// Whether QRS detection applies. Fibrillation and asystole have no
    /// discrete complexes and always yield an empty peak set.
    pub fn has_discrete_qrs(self) -> bool {
        !matches!(
            self,
            RhythmType::FibrillationVentriculaire | RhythmType::Asystole
        )
    }

    /// Rhythms that raise the monitor alarm instead of the QRS beep
    pub fn is_alarmable(self) -> bool {
        matches!(
            self,
            RhythmType::FibrillationVentriculaire
                | RhythmType::FibrillationAtriale
                | RhythmType::TachycardieVentriculaire
                | RhythmType::Asystole
        )
    }

    /// Rhythms without a palpable pulse: no SpO2, flat pleth
    pub fn is_pulseless(self) -> bool {
        matches!(
            self,
            RhythmType::FibrillationVentriculaire
                | RhythmType::TachycardieVentriculaire
                | RhythmType::Asystole
        )
    }

    /// Paced and shock waveforms are drawn with the fixed-gain mapping
    pub fn uses_gain_mapping(self) -> bool {
        matches!(self, RhythmType::ElectroEntrainement | RhythmType::Choc)
    }
}

impl fmt::Display for RhythmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}
