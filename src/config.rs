//! Settings for the Funzl tools.
//!
//! Settings are read from a JSON file. Every field has a default, so a
//! partial file (or no file at all) is valid:
//!
//! ```json
//! { "device": { "byte_delay_ms": 2 }, "export": { "fallback_identifier": "Tune" } }
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{FunzlError, Result};
use crate::serialization::DEFAULT_FALLBACK_IDENTIFIER;

/// Default serial baud rate.
const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default serial read timeout in milliseconds.
const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;

/// Default pause after each byte, giving the board time to process it.
const DEFAULT_BYTE_DELAY_MS: u64 = 1;

/// Default minimum time between progress reports.
const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 100;

/// Default number of bytes written between stop-signal checks.
const DEFAULT_STOP_POLL_BYTES: usize = 64;

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub device: DeviceSettings,
    pub export: ExportSettings,
}

/// Serial transfer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub byte_delay_ms: u64,
    pub progress_interval_ms: u64,
    pub stop_poll_bytes: usize,
    /// Substrings identifying candidate port names.
    pub port_patterns: Vec<String>,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            byte_delay_ms: DEFAULT_BYTE_DELAY_MS,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            stop_poll_bytes: DEFAULT_STOP_POLL_BYTES,
            port_patterns: vec!["ttyACM".to_string(), "ttyUSB".to_string()],
        }
    }
}

impl DeviceSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn byte_delay(&self) -> Duration {
        Duration::from_millis(self.byte_delay_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Whether a port name matches one of the configured patterns.
    pub fn is_candidate(&self, port_name: &str) -> bool {
        self.port_patterns
            .iter()
            .any(|pattern| port_name.contains(pattern.as_str()))
    }
}

/// Source-table export settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Identifier used when the song name has no usable characters.
    pub fallback_identifier: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            fallback_identifier: DEFAULT_FALLBACK_IDENTIFIER.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| FunzlError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| FunzlError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Write settings as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| FunzlError::FileWriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.device.baud_rate, 115_200);
        assert_eq!(settings.device.read_timeout(), Duration::from_secs(1));
        assert_eq!(settings.device.byte_delay(), Duration::from_millis(1));
        assert_eq!(settings.device.progress_interval(), Duration::from_millis(100));
        assert_eq!(settings.export.fallback_identifier, "Untitled");
    }

    #[test]
    fn test_port_patterns() {
        let device = DeviceSettings::default();
        assert!(device.is_candidate("/dev/ttyACM0"));
        assert!(device.is_candidate("/dev/ttyUSB1"));
        assert!(!device.is_candidate("/dev/ttyS0"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("funzl.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("funzl.json");
        fs::write(&path, r#"{ "device": { "byte_delay_ms": 5 } }"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.device.byte_delay_ms, 5);
        assert_eq!(settings.device.baud_rate, 115_200);
        assert_eq!(settings.export, ExportSettings::default());
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("funzl.json");
        fs::write(&path, "{ device: ").unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("funzl.json");
        let mut settings = Settings::default();
        settings.device.port_patterns = vec!["cu.usbmodem".to_string()];

        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }
}
