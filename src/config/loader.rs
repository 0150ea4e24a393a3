// src/config/loader.rs
//! Layered configuration loader: defaults, TOML files, then environment overrides

use crate::config::{constants::paths, SimulatorConfig};
use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Configuration loader with reload notifications
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    env_prefix: String,
    current_config: Arc<RwLock<SimulatorConfig>>,
    subscribers: Vec<Sender<SimulatorConfig>>,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Configuration validation errors: {}", .0.join("; "))]
    ValidationError(Vec<String>),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl ConfigLoader {
    /// Create new configuration loader using the standard search paths
    pub fn new() -> Self {
        Self::with_paths(Self::discover_config_paths())
    }

    /// Create loader with custom paths, later paths take precedence
    pub fn with_paths(config_paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths,
            env_prefix: paths::ENV_PREFIX.to_string(),
            current_config: Arc::new(RwLock::new(SimulatorConfig::default())),
            subscribers: Vec::new(),
        }
    }

    /// Use a different environment variable prefix
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    pub fn config_paths(&self) -> &[PathBuf] {
        &self.config_paths
    }

    /// Load configuration with validation
    pub fn load(&mut self) -> Result<SimulatorConfig, ConfigError> {
        let config = self.load_and_merge_configs()?;
        *self.current_config.write() = config.clone();
        Ok(config)
    }

    /// Get current configuration
    pub fn current(&self) -> SimulatorConfig {
        self.current_config.read().clone()
    }

    /// Receive every configuration produced by a later `reload`
    pub fn subscribe(&mut self) -> Receiver<SimulatorConfig> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Reload configuration and notify subscribers
    pub fn reload(&mut self) -> Result<SimulatorConfig, ConfigError> {
        let config = self.load()?;
        self.subscribers.retain(|tx| tx.send(config.clone()).is_ok());
        debug!(subscribers = self.subscribers.len(), "configuration reloaded");
        Ok(config)
    }

    /// Validate a single file on top of the defaults without loading it
    pub fn validate_config_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let mut merged = Self::default_value()?;
        let overlay = Self::load_config_file(path.as_ref())?;
        Self::merge_toml_values(&mut merged, overlay);
        Self::into_validated(merged).map(|_| ())
    }

    /// Export current configuration to file
    pub fn export_config<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let toml_content = toml::to_string_pretty(&self.current())
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    fn load_and_merge_configs(&self) -> Result<SimulatorConfig, ConfigError> {
        let mut merged_config = Self::default_value()?;

        for config_path in &self.config_paths {
            match Self::load_config_file(config_path) {
                Ok(file_config) => {
                    debug!(path = %config_path.display(), "merging configuration file");
                    Self::merge_toml_values(&mut merged_config, file_config);
                }
                Err(ConfigError::FileNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        self.apply_environment_overrides(&mut merged_config);
        Self::into_validated(merged_config)
    }

    fn default_value() -> Result<toml::Value, ConfigError> {
        toml::Value::try_from(SimulatorConfig::default())
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn into_validated(value: toml::Value) -> Result<SimulatorConfig, ConfigError> {
        let config: SimulatorConfig = value
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError(format!("Failed to deserialize config: {}", e)))?;
        config
            .validate_consistency()
            .map_err(ConfigError::ValidationError)?;
        Ok(config)
    }

    fn load_config_file(path: &Path) -> Result<toml::Value, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    fn merge_toml_values(base: &mut toml::Value, overlay: toml::Value) {
        match (base, overlay) {
            (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
                for (key, value) in overlay_table {
                    if let Some(base_value) = base_table.get_mut(&key) {
                        Self::merge_toml_values(base_value, value);
                    } else {
                        base_table.insert(key, value);
                    }
                }
            }
            (base_value, overlay_value) => {
                *base_value = overlay_value;
            }
        }
    }

    fn apply_environment_overrides(&self, config: &mut toml::Value) {
        for (key, value) in std::env::vars() {
            let Some(stripped) = key.strip_prefix(&self.env_prefix) else {
                continue;
            };
            let parts: Vec<String> = stripped.to_lowercase().split('_').map(str::to_string).collect();

            match Self::resolve_key_path(config, &parts) {
                Some(path) => Self::set_nested_value(config, &path, Self::parse_env_value(&value)),
                None => warn!(variable = %key, "environment override does not match any setting"),
            }
        }
    }

    /// Map `["device", "charge", "duration", "ms"]` onto existing keys such as
    /// `["device", "charge_duration_ms"]`, preferring the longest key at each level.
    fn resolve_key_path(config: &toml::Value, parts: &[String]) -> Option<Vec<String>> {
        if parts.is_empty() {
            return Some(Vec::new());
        }
        let table = config.as_table()?;

        for take in (1..=parts.len()).rev() {
            let candidate = parts[..take].join("_");
            if let Some(child) = table.get(&candidate) {
                let rest = &parts[take..];
                if rest.is_empty() {
                    return Some(vec![candidate]);
                }
                if let Some(mut tail) = Self::resolve_key_path(child, rest) {
                    tail.insert(0, candidate);
                    return Some(tail);
                }
            }
        }
        None
    }

    fn parse_env_value(value: &str) -> toml::Value {
        if let Ok(int_val) = value.parse::<i64>() {
            toml::Value::Integer(int_val)
        } else if let Ok(float_val) = value.parse::<f64>() {
            toml::Value::Float(float_val)
        } else if let Ok(bool_val) = value.parse::<bool>() {
            toml::Value::Boolean(bool_val)
        } else {
            toml::Value::String(value.to_string())
        }
    }

    fn set_nested_value(config: &mut toml::Value, path: &[String], value: toml::Value) {
        let Some((last, parents)) = path.split_last() else {
            return;
        };
        let mut current = config;
        for part in parents {
            match current.get_mut(part.as_str()) {
                Some(next) => current = next,
                None => return,
            }
        }
        if let toml::Value::Table(table) = current {
            table.insert(last.clone(), value);
        }
    }

    fn discover_config_paths() -> Vec<PathBuf> {
        let mut found = vec![PathBuf::from(paths::SYSTEM_CONFIG_PATH)];

        if let Some(home_dir) = dirs::home_dir() {
            found.push(home_dir.join(paths::USER_CONFIG_DIR).join("config.toml"));
        }

        found.push(PathBuf::from(paths::DEFAULT_CONFIG_FILE));
        found.push(PathBuf::from(paths::LOCAL_CONFIG_FILE));
        found
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var_os("USERPROFILE").map(PathBuf::from)
        }
        #[cfg(not(target_os = "windows"))]
        {
            std::env::var_os("HOME").map(PathBuf::from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "{}", content).unwrap();
        temp_file
    }

    #[test]
    fn test_config_loader_creation() {
        let loader = ConfigLoader::new();
        assert!(!loader.config_paths().is_empty());
    }

    #[test]
    fn test_discovered_paths_end_with_local_overrides() {
        let found = ConfigLoader::discover_config_paths();
        assert_eq!(found.first(), Some(&PathBuf::from(paths::SYSTEM_CONFIG_PATH)));
        let tail: Vec<_> = found.iter().rev().take(2).rev().cloned().collect();
        assert_eq!(
            tail,
            vec![
                PathBuf::from(paths::DEFAULT_CONFIG_FILE),
                PathBuf::from(paths::LOCAL_CONFIG_FILE)
            ]
        );
    }

    #[test]
    #[serial]
    fn test_load_defaults_without_files() {
        let mut loader = ConfigLoader::with_paths(vec![PathBuf::from("/nonexistent/defib.toml")]);
        let config = loader.load().unwrap();
        assert_eq!(config, SimulatorConfig::default());
    }

    #[test]
    #[serial]
    fn test_files_merge_in_order() {
        let first = write_temp("[device]\ncharge_duration_ms = 2000\nboot_duration_ms = 1000\n");
        let second = write_temp("[device]\ncharge_duration_ms = 4000\n");

        let mut loader = ConfigLoader::with_paths(vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);
        let config = loader.load().unwrap();

        assert_eq!(config.device.charge_duration_ms, 4000);
        assert_eq!(config.device.boot_duration_ms, 1000);
    }

    #[test]
    fn test_config_file_validation() {
        let loader = ConfigLoader::with_paths(Vec::new());
        let valid = write_temp("[waveform]\nstream_cycles = 4\n\n[display.ecg]\nwidth = 640\nheight = 80\ntime_window_seconds = 6.0\n");
        assert!(loader.validate_config_file(valid.path()).is_ok());
    }

    #[test]
    fn test_invalid_config_validation() {
        let loader = ConfigLoader::with_paths(Vec::new());
        let invalid = write_temp("[display]\nframe_rate_hz = 0\n");

        match loader.validate_config_file(invalid.path()) {
            Err(ConfigError::ValidationError(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let loader = ConfigLoader::with_paths(Vec::new());
        let broken = write_temp("[device\ncharge_duration_ms = ");
        assert!(matches!(
            loader.validate_config_file(broken.path()),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        std::env::set_var("DEFIBTEST_DEVICE_CHARGE_DURATION_MS", "1234");
        std::env::set_var("DEFIBTEST_DISPLAY_ECG_WIDTH", "640");

        let mut loader = ConfigLoader::with_paths(Vec::new()).with_env_prefix("DEFIBTEST_");
        let config = loader.load().unwrap();

        std::env::remove_var("DEFIBTEST_DEVICE_CHARGE_DURATION_MS");
        std::env::remove_var("DEFIBTEST_DISPLAY_ECG_WIDTH");

        assert_eq!(config.device.charge_duration_ms, 1234);
        assert_eq!(config.display.ecg.width, 640);
    }

    #[test]
    #[serial]
    fn test_reload_notifies_subscribers() {
        let mut loader = ConfigLoader::with_paths(Vec::new());
        let rx = loader.subscribe();
        loader.reload().unwrap();
        assert_eq!(rx.try_recv().unwrap(), SimulatorConfig::default());
    }

    #[test]
    fn test_config_export() {
        let loader = ConfigLoader::with_paths(Vec::new());
        let temp_file = NamedTempFile::new().unwrap();

        loader.export_config(temp_file.path()).unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("[device]"));
        assert!(content.contains("charge_duration_ms"));
    }
}
