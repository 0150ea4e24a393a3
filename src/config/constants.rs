// src/config/constants.rs
//! System-wide configuration constants

/// Waveform synthesis constants
pub mod waveform {
    /// Reference sampling rate of every rhythm template.
    pub const SAMPLING_RATE_HZ: u32 = 250;
    /// Heart rate at which a stored single-cycle template has its native length.
    pub const REFERENCE_HEART_RATE_BPM: f32 = 60.0;
    pub const DEFAULT_STREAM_CYCLES: usize = 6;
    pub const MIN_STREAM_CYCLES: usize = 1;
    pub const MAX_STREAM_CYCLES: usize = 64;

    pub const MIN_HEART_RATE_BPM: f32 = 30.0;
    pub const MAX_HEART_RATE_BPM: f32 = 220.0;
    pub const DEFAULT_HEART_RATE_BPM: f32 = 70.0;

    /// Pacing intensity at and above which the evoked complex captures.
    pub const CAPTURE_THRESHOLD_MA: u32 = 90;
}

/// QRS and pacing-spike detection constants
pub mod detection {
    pub const SLOPE_THRESHOLD: f32 = 0.1;
    pub const SEARCH_WINDOW_SAMPLES: usize = 15;
    /// ~150 ms at 250 Hz, keeps T waves out of the peak set.
    pub const REFRACTORY_SAMPLES: usize = 38;
    pub const SPIKE_DELTA_THRESHOLD: f32 = 0.4;
}

/// Device state machine constants
pub mod device {
    pub const BOOT_DURATION_MS: u64 = 5000;
    pub const BOOT_PROGRESS_STEP_PERCENT: f32 = 2.0;
    pub const BOOT_PROGRESS_STEP_MS: u64 = 100;
    pub const CHARGE_DURATION_MS: u64 = 3000;
    pub const SYNCHRO_TIMEOUT_MS: u64 = 5000;
    pub const TICK_INTERVAL_MS: u64 = 100;

    pub const CHARGE_COMPLETE_PERCENT: f32 = 100.0;

    pub const MIN_PACER_FREQUENCY_PPM: u32 = 30;
    pub const MAX_PACER_FREQUENCY_PPM: u32 = 200;
    pub const DEFAULT_PACER_FREQUENCY_PPM: u32 = 70;
    pub const PACER_FREQUENCY_STEP_PPM: u32 = 5;

    pub const MIN_PACER_INTENSITY_MA: u32 = 5;
    pub const MAX_PACER_INTENSITY_MA: u32 = 200;
    pub const DEFAULT_PACER_INTENSITY_MA: u32 = 30;
    pub const PACER_INTENSITY_STEP_MA: u32 = 5;

    /// Energies selectable on the manual dial, in joules.
    pub const ENERGY_LEVELS_J: [u32; 19] = [
        1, 2, 3, 5, 6, 7, 8, 9, 10, 15, 20, 30, 50, 70, 100, 120, 150, 170, 200,
    ];
    pub const DEFAULT_ENERGY_J: u32 = 150;

    pub const MIN_CHANNEL: u8 = 1;
    pub const MAX_CHANNEL: u8 = 3;
    pub const DEFAULT_CHANNEL: u8 = 1;
    pub const CHARGE_CHANNEL: u8 = 2;
    pub const SHOCK_CHANNEL: u8 = 3;
}

/// Vital sign display constants
pub mod vitals {
    /// Heart-rate values cycled on the display during ventricular fibrillation.
    pub const FV_DISPLAY_HEART_RATES: [u32; 7] = [169, 170, 180, 175, 163, 173, 190];
    pub const FV_DISPLAY_PERIOD_MS: u64 = 2000;
    pub const FIBRILLATION_MIN_RATE_BPM: f32 = 160.0;
    pub const FIBRILLATION_RATE_SPAN_BPM: f32 = 30.0;
    pub const SPO2_ATRIAL_FIBRILLATION_PERCENT: u32 = 95;
    pub const SPO2_DEFAULT_PERCENT: u32 = 92;
}

/// Display and renderer constants
pub mod display {
    pub const DEFAULT_FRAME_RATE_HZ: u32 = 60;
    pub const MAX_FRAME_RATE_HZ: u32 = 240;

    pub const ECG_WIDTH_PX: u32 = 800;
    pub const ECG_HEIGHT_PX: u32 = 65;
    pub const ECG_TIME_WINDOW_S: f32 = 7.0;
    pub const ECG_TOP_MARGIN_RATIO: f32 = 0.3;
    pub const ECG_BOTTOM_MARGIN_RATIO: f32 = 0.1;
    /// Pixels per millivolt for the gain-based mapping.
    pub const ECG_GAIN_PX_PER_MV: f32 = 20.0;

    pub const PLETH_WIDTH_PX: u32 = 800;
    pub const PLETH_HEIGHT_PX: u32 = 80;
    pub const PLETH_TIME_WINDOW_S: f32 = 13.3;

    pub const ERASE_WIDTH_PX: u32 = 3;
    pub const ERASE_LEAD_PX: u32 = 2;
    /// Vertical grid lines every 200 ms.
    pub const GRID_TIME_DIVISIONS_PER_S: f32 = 5.0;
    pub const GRID_ROW_SPACING_PX: u32 = 10;

    pub const TRACE_WIDTH_PX: f32 = 2.0;
    pub const SPIKE_WIDTH_PX: f32 = 3.0;
    pub const DOT_PATTERN_PX: u32 = 4;
    pub const DOT_SIZE_PX: u32 = 2;

    pub const ARROW_SHAFT_PX: f32 = 10.0;
    pub const ARROW_TIP_PX: f32 = 15.0;
    pub const ARROW_HALF_WIDTH_PX: f32 = 4.0;
}

/// Configuration file locations
pub mod paths {
    pub const SYSTEM_CONFIG_PATH: &str = "/etc/defib-core/config.toml";
    pub const USER_CONFIG_DIR: &str = ".config/defib-core";
    pub const DEFAULT_CONFIG_FILE: &str = "config/default.toml";
    pub const LOCAL_CONFIG_FILE: &str = "defib.toml";
    pub const ENV_PREFIX: &str = "DEFIB_";
}
