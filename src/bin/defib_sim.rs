//! Headless simulator run
//!
//! Boots a device, attaches in-memory ECG and pleth screens, plays a short
//! scenario and prints the final panel state as JSON.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use defib_core::config::ConfigLoader;
use defib_core::device::{DisplayMode, NullAudioSink};
use defib_core::render::FrameBuffer;
use defib_core::session::{SimulatorSession, TraceChannel};
use defib_core::RhythmType;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scenario {
    /// Charge and deliver one manual shock
    Shock,
    /// Synchronized shock on the next R-peak
    Synchro,
    /// External pacing of a complete AV block
    Pacing,
}

#[derive(Parser, Debug)]
#[command(name = "defib-sim", version, about = "Headless defibrillator simulator")]
struct Args {
    /// Configuration file, merged over the defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "shock")]
    scenario: Scenario,

    /// Patient heart rate in bpm
    #[arg(long, default_value = "70")]
    heart_rate: u32,

    /// Pacer intensity for the pacing scenario, in mA
    #[arg(long, default_value = "90")]
    intensity: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let args = Args::parse();

    let mut loader = match &args.config {
        Some(path) => ConfigLoader::with_paths(vec![path.clone()]),
        None => ConfigLoader::new(),
    };
    let config = loader.load().context("loading configuration")?;
    let boot = config.device.boot_duration() + config.device.tick_interval();
    let charge = config.device.charge_duration() + config.device.tick_interval();

    let session = SimulatorSession::start(config.clone(), Box::new(NullAudioSink))?;
    let ecg = Arc::new(Mutex::new(FrameBuffer::new(config.display.ecg.width, config.display.ecg.height)));
    let pleth = Arc::new(Mutex::new(FrameBuffer::new(
        config.display.pleth.width,
        config.display.pleth.height,
    )));
    let ecg_handle = session.spawn_surface(Arc::clone(&ecg), TraceChannel::Ecg)?;
    let _pleth_handle = session.spawn_surface(Arc::clone(&pleth), TraceChannel::Pleth)?;

    match args.scenario {
        Scenario::Shock | Scenario::Synchro => {
            session.set_patient(RhythmType::Sinus, args.heart_rate);
            session.set_mode(DisplayMode::Manual);
            tokio::time::sleep(boot).await;
            if matches!(args.scenario, Scenario::Synchro) {
                session.toggle_synchro();
            }
            session.start_charging();
            tokio::time::sleep(charge).await;
            let outcome = session.deliver_shock();
            info!(?outcome, "shock button pressed");
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
        Scenario::Pacing => {
            session.set_patient(RhythmType::Bav3, args.heart_rate);
            session.set_mode(DisplayMode::Pacing);
            tokio::time::sleep(boot).await;
            session.set_pacer_frequency(60);
            session.set_pacer_intensity(args.intensity);
            session.toggle_pacing();
            tokio::time::sleep(Duration::from_secs(3)).await;
        }
    }

    info!(frames = ecg_handle.frames_rendered(), "scenario finished");
    let events: Vec<_> = session.events().try_iter().collect();
    let report = serde_json::json!({
        "panel": session.panel_state(),
        "events": events,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
