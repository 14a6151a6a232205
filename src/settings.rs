// src/settings.rs
//
// Application settings, loaded from a TOML file with per-field defaults.
// Command-line flags are applied on top by the binary.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::io::serial::{Parity, SerialConfig, DEFAULT_MAX_LINE_LENGTH};
use crate::io::{IoError, PublisherConfig, DEFAULT_UPDATE_HZ};

const SETTINGS_FILE: &str = "config.toml";
const APP_DIR: &str = "stickbridge";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SerialSettings {
    /// Device path, e.g. "/dev/ttyUSB0" or "COM3"
    #[serde(default)]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PublisherSettings {
    #[serde(default = "default_update_hz")]
    pub update_hz: u32,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HttpSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Directory served for paths other than the packet endpoints
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppSettings {
    #[serde(default)]
    pub serial: SerialSettings,
    #[serde(default)]
    pub publisher: PublisherSettings,
    #[serde(default)]
    pub http: HttpSettings,
    /// When set, log messages are also written to a file in this directory
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Enable per-packet debug logging
    #[serde(default)]
    pub verbose: bool,
}

fn default_baud_rate() -> u32 {
    14400
}
fn default_data_bits() -> u8 {
    8
}
fn default_stop_bits() -> u8 {
    1
}
fn default_max_line_length() -> usize {
    DEFAULT_MAX_LINE_LENGTH
}
fn default_update_hz() -> u32 {
    DEFAULT_UPDATE_HZ
}
fn default_read_timeout_ms() -> u64 {
    1000
}
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: Parity::default(),
            max_line_length: default_max_line_length(),
        }
    }
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            update_hz: default_update_hz(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            static_dir: None,
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            serial: SerialSettings::default(),
            publisher: PublisherSettings::default(),
            http: HttpSettings::default(),
            log_dir: None,
            verbose: false,
        }
    }
}

impl AppSettings {
    /// Check values that would otherwise fail later at runtime.
    /// `replay` is true when input comes from a capture file instead of a port.
    pub fn validate(&self, replay: bool) -> Result<(), IoError> {
        if !replay && self.serial.port.trim().is_empty() {
            return Err(IoError::configuration(
                "No serial port configured (set serial.port or pass --port)",
            ));
        }
        if self.serial.baud_rate == 0 {
            return Err(IoError::configuration("serial.baud_rate must be greater than 0"));
        }
        if self.serial.max_line_length == 0 {
            return Err(IoError::configuration("serial.max_line_length must be greater than 0"));
        }
        if self.publisher.update_hz == 0 {
            return Err(IoError::configuration("publisher.update_hz must be greater than 0"));
        }
        if self.publisher.read_timeout_ms == 0 {
            return Err(IoError::configuration("publisher.read_timeout_ms must be greater than 0"));
        }
        self.bind_addr()?;
        Ok(())
    }

    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig {
            update_hz: self.publisher.update_hz,
            read_timeout: Duration::from_millis(self.publisher.read_timeout_ms),
        }
    }

    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig {
            port: self.serial.port.clone(),
            baud_rate: self.serial.baud_rate,
            data_bits: self.serial.data_bits,
            stop_bits: self.serial.stop_bits,
            parity: self.serial.parity,
            max_line_length: self.serial.max_line_length,
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, IoError> {
        self.http
            .bind
            .parse()
            .map_err(|e| IoError::configuration(format!("Invalid http.bind {:?}: {}", self.http.bind, e)))
    }
}

/// Default settings file location, e.g. `~/.config/stickbridge/config.toml`
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
}

/// Parse settings from TOML text
pub fn parse_settings(text: &str) -> Result<AppSettings, IoError> {
    toml::from_str(text).map_err(|e| IoError::configuration(format!("Failed to parse settings: {}", e)))
}

/// Load settings from `path`, or from the default location when `None`.
///
/// A missing file at the default location yields defaults; a missing file
/// that was asked for explicitly is an error.
pub fn load_settings(path: Option<&Path>) -> Result<AppSettings, IoError> {
    let (settings_path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => match default_settings_path() {
            Some(p) => (p, false),
            None => return Ok(AppSettings::default()),
        },
    };

    if !settings_path.exists() {
        if explicit {
            return Err(IoError::configuration(format!(
                "Settings file not found: {}",
                settings_path.display()
            )));
        }
        return Ok(AppSettings::default());
    }

    let text = std::fs::read_to_string(&settings_path).map_err(|e| {
        IoError::configuration(format!("Failed to read {}: {}", settings_path.display(), e))
    })?;
    let settings = parse_settings(&text)?;
    tlog!("[settings] Loaded {}", settings_path.display());
    Ok(settings)
}

/// Write settings as TOML, creating parent directories as needed
pub fn save_settings(path: &Path, settings: &AppSettings) -> Result<(), IoError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| IoError::configuration(format!("Failed to create settings dir: {}", e)))?;
    }
    let text = toml::to_string_pretty(settings)
        .map_err(|e| IoError::configuration(format!("Failed to serialise settings: {}", e)))?;
    std::fs::write(path, text)
        .map_err(|e| IoError::configuration(format!("Failed to write {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = AppSettings::default();
        assert_eq!(settings.serial.baud_rate, 14400);
        assert_eq!(settings.serial.parity, Parity::None);
        assert_eq!(settings.publisher.update_hz, 100);
        assert_eq!(settings.http.bind, "127.0.0.1:8080");
        assert_eq!(settings.publisher_config(), PublisherConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings = parse_settings(
            r#"
            verbose = true

            [serial]
            port = "/dev/ttyUSB0"
            parity = "even"

            [publisher]
            update_hz = 50
            "#,
        )
        .unwrap();

        assert!(settings.verbose);
        assert_eq!(settings.serial.port, "/dev/ttyUSB0");
        assert_eq!(settings.serial.parity, Parity::Even);
        assert_eq!(settings.serial.baud_rate, 14400);
        assert_eq!(settings.publisher.update_hz, 50);
        assert_eq!(settings.publisher.read_timeout_ms, 1000);
        assert_eq!(settings.http, HttpSettings::default());
        assert_eq!(
            settings.publisher_config().update_interval(),
            Duration::from_millis(20)
        );
    }

    #[test]
    fn test_malformed_file_is_configuration_error() {
        let err = parse_settings("[publisher]\nupdate_hz = \"fast\"").unwrap_err();
        assert!(matches!(err, IoError::Configuration(_)));
    }

    #[test]
    fn test_validate() {
        let mut settings = AppSettings::default();
        assert!(settings.validate(false).is_err()); // no port
        assert!(settings.validate(true).is_ok()); // replay needs no port

        settings.serial.port = "/dev/ttyUSB0".to_string();
        assert!(settings.validate(false).is_ok());

        settings.publisher.update_hz = 0;
        assert!(settings.validate(false).is_err());
        settings.publisher.update_hz = 100;

        settings.publisher.read_timeout_ms = 0;
        assert!(settings.validate(false).is_err());
        settings.publisher.read_timeout_ms = 1000;

        settings.http.bind = "not an address".to_string();
        assert!(settings.validate(false).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = AppSettings::default();
        settings.serial.port = "COM3".to_string();
        settings.http.static_dir = Some(PathBuf::from("web"));
        save_settings(&path, &settings).unwrap();

        assert_eq!(load_settings(Some(&path)).unwrap(), settings);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(load_settings(Some(&path)).is_err());
    }
}
