// src/config/mod.rs
//! Simulator configuration

pub mod constants;
pub mod loader;

pub use constants::*;
pub use loader::{ConfigError, ConfigLoader};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete simulator configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct SimulatorConfig {
    #[serde(default)]
    pub waveform: WaveformConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Waveform synthesis settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WaveformConfig {
    #[serde(default = "defaults::sampling_rate_hz")]
    pub sampling_rate_hz: u32,

    /// Number of cardiac cycles concatenated into one stream.
    #[serde(default = "defaults::stream_cycles")]
    pub stream_cycles: usize,

    #[serde(default = "defaults::capture_threshold_ma")]
    pub capture_threshold_ma: u32,
}

/// Event detector thresholds
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct DetectionConfig {
    #[serde(default = "defaults::slope_threshold")]
    pub slope_threshold: f32,

    #[serde(default = "defaults::search_window")]
    pub search_window: usize,

    #[serde(default = "defaults::refractory_samples")]
    pub refractory_samples: usize,

    #[serde(default = "defaults::spike_delta")]
    pub spike_delta: f32,
}

/// Device timing and default settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DeviceConfig {
    #[serde(default = "defaults::boot_duration_ms")]
    pub boot_duration_ms: u64,

    #[serde(default = "defaults::charge_duration_ms")]
    pub charge_duration_ms: u64,

    #[serde(default = "defaults::synchro_timeout_ms")]
    pub synchro_timeout_ms: u64,

    #[serde(default = "defaults::tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "defaults::pacer_frequency_ppm")]
    pub default_pacer_frequency_ppm: u32,

    #[serde(default = "defaults::pacer_intensity_ma")]
    pub default_pacer_intensity_ma: u32,

    #[serde(default = "defaults::energy_j")]
    pub default_energy_j: u32,
}

/// Display settings shared by all surfaces
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DisplayConfig {
    #[serde(default = "defaults::frame_rate_hz")]
    pub frame_rate_hz: u32,

    #[serde(default = "SurfaceConfig::ecg")]
    pub ecg: SurfaceConfig,

    #[serde(default = "SurfaceConfig::pleth")]
    pub pleth: SurfaceConfig,
}

/// Geometry and look of one scrolling surface
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,
    pub time_window_seconds: f32,

    #[serde(default = "defaults::top_margin_ratio")]
    pub top_margin_ratio: f32,

    #[serde(default = "defaults::bottom_margin_ratio")]
    pub bottom_margin_ratio: f32,

    #[serde(default = "defaults::gain_px_per_mv")]
    pub gain_px_per_mv: f32,

    #[serde(default = "defaults::erase_width_px")]
    pub erase_width_px: u32,

    #[serde(default = "defaults::grid_row_spacing_px")]
    pub grid_row_spacing_px: u32,

    #[serde(default)]
    pub palette: Palette,
}

/// Colors used by a surface, as `0xRRGGBB`
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct Palette {
    pub background: u32,
    pub grid: u32,
    pub trace: u32,
    pub marker: u32,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: 0x000000,
            grid: 0x002200,
            trace: 0x00ff00,
            marker: 0xffffff,
        }
    }
}

impl Palette {
    /// Cyan trace used by the plethysmography channel.
    pub fn pleth() -> Self {
        Self {
            background: 0x000000,
            grid: 0x001122,
            trace: 0x00bfff,
            marker: 0xffffff,
        }
    }
}

/// Default value providers using constants
mod defaults {
    use crate::config::constants::*;

    pub fn sampling_rate_hz() -> u32 { waveform::SAMPLING_RATE_HZ }
    pub fn stream_cycles() -> usize { waveform::DEFAULT_STREAM_CYCLES }
    pub fn capture_threshold_ma() -> u32 { waveform::CAPTURE_THRESHOLD_MA }

    pub fn slope_threshold() -> f32 { detection::SLOPE_THRESHOLD }
    pub fn search_window() -> usize { detection::SEARCH_WINDOW_SAMPLES }
    pub fn refractory_samples() -> usize { detection::REFRACTORY_SAMPLES }
    pub fn spike_delta() -> f32 { detection::SPIKE_DELTA_THRESHOLD }

    pub fn boot_duration_ms() -> u64 { device::BOOT_DURATION_MS }
    pub fn charge_duration_ms() -> u64 { device::CHARGE_DURATION_MS }
    pub fn synchro_timeout_ms() -> u64 { device::SYNCHRO_TIMEOUT_MS }
    pub fn tick_interval_ms() -> u64 { device::TICK_INTERVAL_MS }
    pub fn pacer_frequency_ppm() -> u32 { device::DEFAULT_PACER_FREQUENCY_PPM }
    pub fn pacer_intensity_ma() -> u32 { device::DEFAULT_PACER_INTENSITY_MA }
    pub fn energy_j() -> u32 { device::DEFAULT_ENERGY_J }

    pub fn frame_rate_hz() -> u32 { display::DEFAULT_FRAME_RATE_HZ }
    pub fn top_margin_ratio() -> f32 { display::ECG_TOP_MARGIN_RATIO }
    pub fn bottom_margin_ratio() -> f32 { display::ECG_BOTTOM_MARGIN_RATIO }
    pub fn gain_px_per_mv() -> f32 { display::ECG_GAIN_PX_PER_MV }
    pub fn erase_width_px() -> u32 { display::ERASE_WIDTH_PX }
    pub fn grid_row_spacing_px() -> u32 { display::GRID_ROW_SPACING_PX }
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            sampling_rate_hz: defaults::sampling_rate_hz(),
            stream_cycles: defaults::stream_cycles(),
            capture_threshold_ma: defaults::capture_threshold_ma(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            slope_threshold: defaults::slope_threshold(),
            search_window: defaults::search_window(),
            refractory_samples: defaults::refractory_samples(),
            spike_delta: defaults::spike_delta(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            boot_duration_ms: defaults::boot_duration_ms(),
            charge_duration_ms: defaults::charge_duration_ms(),
            synchro_timeout_ms: defaults::synchro_timeout_ms(),
            tick_interval_ms: defaults::tick_interval_ms(),
            default_pacer_frequency_ppm: defaults::pacer_frequency_ppm(),
            default_pacer_intensity_ma: defaults::pacer_intensity_ma(),
            default_energy_j: defaults::energy_j(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            frame_rate_hz: defaults::frame_rate_hz(),
            ecg: SurfaceConfig::ecg(),
            pleth: SurfaceConfig::pleth(),
        }
    }
}

impl SurfaceConfig {
    /// Surface with the given geometry and ECG styling.
    pub fn new(width: u32, height: u32, time_window_seconds: f32) -> Self {
        Self {
            width,
            height,
            time_window_seconds,
            top_margin_ratio: defaults::top_margin_ratio(),
            bottom_margin_ratio: defaults::bottom_margin_ratio(),
            gain_px_per_mv: defaults::gain_px_per_mv(),
            erase_width_px: defaults::erase_width_px(),
            grid_row_spacing_px: defaults::grid_row_spacing_px(),
            palette: Palette::default(),
        }
    }

    pub fn ecg() -> Self {
        Self::new(display::ECG_WIDTH_PX, display::ECG_HEIGHT_PX, display::ECG_TIME_WINDOW_S)
    }

    pub fn pleth() -> Self {
        Self {
            top_margin_ratio: 5.0 / display::PLETH_HEIGHT_PX as f32,
            bottom_margin_ratio: 15.0 / display::PLETH_HEIGHT_PX as f32,
            grid_row_spacing_px: 25,
            palette: Palette::pleth(),
            ..Self::new(display::PLETH_WIDTH_PX, display::PLETH_HEIGHT_PX, display::PLETH_TIME_WINDOW_S)
        }
    }

    pub fn pixels_per_second(&self) -> f32 {
        self.width as f32 / self.time_window_seconds
    }

    fn validate(&self, name: &str, errors: &mut Vec<String>) {
        if self.width == 0 || self.height == 0 {
            errors.push(format!("{} surface must have non-zero size, got {}x{}", name, self.width, self.height));
        }
        if !(self.time_window_seconds > 0.0) {
            errors.push(format!("{} time window must be positive, got {}", name, self.time_window_seconds));
        }
        if self.top_margin_ratio < 0.0 || self.bottom_margin_ratio < 0.0
            || self.top_margin_ratio + self.bottom_margin_ratio >= 1.0
        {
            errors.push(format!("{} margins leave no trace band", name));
        }
    }
}

impl DeviceConfig {
    pub fn boot_duration(&self) -> Duration {
        Duration::from_millis(self.boot_duration_ms)
    }

    pub fn charge_duration(&self) -> Duration {
        Duration::from_millis(self.charge_duration_ms)
    }

    pub fn synchro_timeout(&self) -> Duration {
        Duration::from_millis(self.synchro_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl SimulatorConfig {
    /// Validate configuration consistency
    pub fn validate_consistency(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.waveform.sampling_rate_hz == 0 {
            errors.push("Sampling rate must be positive".to_string());
        }
        if !(waveform::MIN_STREAM_CYCLES..=waveform::MAX_STREAM_CYCLES).contains(&self.waveform.stream_cycles) {
            errors.push(format!(
                "Stream cycles ({}) must be within {}..={}",
                self.waveform.stream_cycles, waveform::MIN_STREAM_CYCLES, waveform::MAX_STREAM_CYCLES
            ));
        }
        if !(device::MIN_PACER_INTENSITY_MA..=device::MAX_PACER_INTENSITY_MA)
            .contains(&self.waveform.capture_threshold_ma)
        {
            errors.push(format!(
                "Capture threshold ({} mA) must be within the pacer intensity range",
                self.waveform.capture_threshold_ma
            ));
        }

        if !(self.detection.slope_threshold > 0.0) || !(self.detection.spike_delta > 0.0) {
            errors.push("Detection thresholds must be positive".to_string());
        }
        if self.detection.refractory_samples == 0 || self.detection.search_window == 0 {
            errors.push("Refractory period and search window must be non-zero".to_string());
        }

        if self.device.charge_duration_ms == 0 {
            errors.push("Charge duration must be non-zero".to_string());
        }
        if self.device.tick_interval_ms == 0 {
            errors.push("Device tick interval must be non-zero".to_string());
        }

        if self.display.frame_rate_hz == 0 || self.display.frame_rate_hz > display::MAX_FRAME_RATE_HZ {
            errors.push(format!(
                "Frame rate ({} Hz) must be within 1..={}",
                self.display.frame_rate_hz, display::MAX_FRAME_RATE_HZ
            ));
        }
        self.display.ecg.validate("ECG", &mut errors);
        self.display.pleth.validate("Pleth", &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Same checks as [`validate_consistency`](Self::validate_consistency),
    /// as a loader error
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_consistency().map_err(ConfigError::ValidationError)
    }

    /// Interval between two scheduled frames
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.display.frame_rate_hz.max(1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_creation() {
        let config = SimulatorConfig::default();
        assert_eq!(config.waveform.sampling_rate_hz, waveform::SAMPLING_RATE_HZ);
        assert_eq!(config.detection.refractory_samples, 38);
        assert_eq!(config.waveform.capture_threshold_ma, 90);
        assert!(config.validate_consistency().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = SimulatorConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: SimulatorConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: SimulatorConfig = toml::from_str("[device]\ncharge_duration_ms = 1500\n").unwrap();
        assert_eq!(config.device.charge_duration_ms, 1500);
        assert_eq!(config.device.boot_duration_ms, device::BOOT_DURATION_MS);
        assert_eq!(config.display.ecg.width, display::ECG_WIDTH_PX);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SimulatorConfig::default();
        config.display.ecg.width = 0;
        config.waveform.capture_threshold_ma = 500;

        let errors = config.validate_consistency().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(e)) if e.len() == 2));
    }

    #[test]
    fn test_frame_period() {
        let config = SimulatorConfig::default();
        let period = config.frame_period();
        assert!(period > Duration::from_millis(16) && period < Duration::from_millis(17));
    }

    #[test]
    fn test_pixels_per_second() {
        let surface = SurfaceConfig::new(700, 65, 7.0);
        assert_eq!(surface.pixels_per_second(), 100.0);
    }
}
