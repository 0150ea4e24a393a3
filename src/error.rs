// src/error.rs
//! Error types for the simulator core
//!
//! Device and waveform operations never fail: out-of-range inputs are clamped
//! and operations that make no sense in the current mode are ignored. Errors
//! only surface at the edges: loading configuration, building a renderer for
//! a surface, and running the session tasks.

use crate::config::ConfigError;
use thiserror::Error;

/// Unified error type for the simulator core
#[derive(Debug, Error)]
pub enum DefibError {
    /// Configuration could not be loaded or failed validation
    #[error("[CONFIG] {0}")]
    Config(#[from] ConfigError),

    /// A renderer was asked to draw on a surface it cannot map samples onto
    #[error("[RENDER] Invalid surface geometry {width}x{height} over {time_window_seconds}s")]
    InvalidSurface {
        width: u32,
        height: u32,
        time_window_seconds: f32,
    },

    /// The session runtime failed
    #[error("[RUNTIME] {0}")]
    Runtime(String),
}

/// Result type alias for simulator operations
pub type DefibResult<T> = Result<T, DefibError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DefibError::InvalidSurface {
            width: 0,
            height: 65,
            time_window_seconds: 7.0,
        };

        let display = format!("{}", err);
        assert!(display.contains("[RENDER]"));
        assert!(display.contains("0x65"));
    }

    #[test]
    fn test_error_conversion() {
        let config_err = ConfigError::ValidationError(vec!["bad frame rate".to_string()]);
        let err: DefibError = config_err.into();

        match err {
            DefibError::Config(ConfigError::ValidationError(errors)) => {
                assert_eq!(errors, vec!["bad frame rate".to_string()]);
            }
            _ => panic!("Expected configuration error"),
        }
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DefibError>();
    }
}
