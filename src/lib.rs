//! Defib-Core: simulation core for a defibrillator/monitor training device
//!
//! This library drives the screens and controls of a simulated
//! defibrillator. It features:
//!
//! - Rhythm template library and rate-scaled waveform synthesis
//! - QRS and pacing-spike detection over the synthesized stream
//! - Scrolling trace renderer for any pixel surface
//! - Device state machine for modes, charge, shock, synchro and pacing
//! - Vitals and alarm sequencing
//! - Tokio session running one frame loop per surface (feature `runtime`)
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use defib_core::config::SimulatorConfig;
//! use defib_core::device::{DisplayMode, NullAudioSink};
//! use defib_core::render::FrameBuffer;
//! use defib_core::session::{SimulatorSession, TraceChannel};
//! use parking_lot::Mutex;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = SimulatorSession::start(SimulatorConfig::default(), Box::new(NullAudioSink))?;
//!     let screen = Arc::new(Mutex::new(FrameBuffer::new(800, 65)));
//!     let _ecg = session.spawn_surface(Arc::clone(&screen), TraceChannel::Ecg)?;
//!
//!     session.set_mode(DisplayMode::Manual);
//!     tokio::time::sleep(std::time::Duration::from_secs(6)).await;
//!     session.start_charging();
//!     tokio::time::sleep(std::time::Duration::from_secs(3)).await;
//!     session.deliver_shock();
//!
//!     println!("{:?}", session.panel_state());
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod device;
pub mod error;
pub mod render;
pub mod rhythm;
#[cfg(feature = "runtime")]
pub mod session;
pub mod utils;
pub mod waveform;

// Re-export commonly used types for convenience
pub use config::{ConfigLoader, SimulatorConfig, SurfaceConfig};
pub use device::{DeviceEvent, DeviceState, DeviceStateMachine, DisplayMode, ShockOutcome};
pub use error::{DefibError, DefibResult};
pub use render::{ScrollingRenderer, Surface, ViewOptions};
pub use rhythm::RhythmType;
pub use utils::time::TimeProvider;
pub use waveform::{WaveformParams, WaveformSnapshot, WaveformSynthesizer};

#[cfg(feature = "runtime")]
pub use session::{SimulatorSession, SurfaceHandle, TraceChannel};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    let mut features = vec![
        "Rhythm templates".to_string(),
        "QRS and pacing-spike detection".to_string(),
        "Scrolling trace renderer".to_string(),
        "Device state machine".to_string(),
    ];
    if cfg!(feature = "runtime") {
        features.push("Tokio session runtime".to_string());
    }

    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Defibrillator/monitor training simulator core".to_string(),
        features,
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
    /// List of features
    pub features: Vec<String>,
}
