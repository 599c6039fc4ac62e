//! Configuration for the Psamathe controller
//!
//! Provides configuration file handling and validation. Supports JSON and
//! TOML formats, selected by file extension, stored in the
//! platform-specific config directory.
//!
//! Configuration is organized into logical sections:
//! - Connection settings (port, baud rate, timeouts)
//! - Motion settings (chunking distance, ack timeout, retry budget)
//! - Table settings (physical geometry constants)

use crate::error::{Result, SettingsError};
use psamathe_core::TableGeometry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Serial connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Serial port path (e.g., "/dev/ttyACM0", "COM3")
    pub port: String,
    /// Baud rate for the serial connection
    pub baud_rate: u32,
    /// Read poll timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: "Auto".to_string(),
            baud_rate: 115_200,
            timeout_ms: 50,
        }
    }
}

/// Motion sequencing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionSettings {
    /// Maximum travel per command, in mm; longer segments are chunked
    pub max_step_distance_mm: f64,
    /// How long to wait for an acknowledgment, in milliseconds
    pub ack_timeout_ms: u64,
    /// Maximum transmissions of one command before faulting
    pub retry_budget: u32,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            max_step_distance_mm: 4.0,
            ack_timeout_ms: 2000,
            retry_budget: 3,
        }
    }
}

impl MotionSettings {
    /// The ack timeout as a `Duration`
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}

/// Table geometry settings
///
/// Mirrors [`TableGeometry`]; kept as its own section so a config file
/// reads the same way the machine's calibration sheet does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSettings {
    /// In-out motor steps per millimetre of arm travel
    pub inout_steps_per_mm: f64,
    /// Degrees of platter rotation per rotation motor step
    pub rotation_deg_per_step: f64,
    /// In-out steps to subtract per rotation step to cancel coupling
    pub compensation_ratio: f64,
    /// Outer boundary of the drawable area, in mm
    pub workspace_radius_mm: f64,
    /// Inner un-drawable circle radius, in mm
    pub inner_radius_mm: f64,
}

impl Default for TableSettings {
    fn default() -> Self {
        let geo = TableGeometry::default();
        Self {
            inout_steps_per_mm: geo.inout_steps_per_mm,
            rotation_deg_per_step: geo.rotation_deg_per_step,
            compensation_ratio: geo.compensation_ratio,
            workspace_radius_mm: geo.workspace_radius_mm,
            inner_radius_mm: geo.inner_radius_mm,
        }
    }
}

impl TableSettings {
    /// Convert to the core geometry type
    pub fn geometry(&self) -> TableGeometry {
        TableGeometry {
            inout_steps_per_mm: self.inout_steps_per_mm,
            rotation_deg_per_step: self.rotation_deg_per_step,
            compensation_ratio: self.compensation_ratio,
            workspace_radius_mm: self.workspace_radius_mm,
            inner_radius_mm: self.inner_radius_mm,
        }
    }
}

/// Top-level controller configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Serial connection section
    #[serde(default)]
    pub connection: ConnectionSettings,
    /// Motion sequencing section
    #[serde(default)]
    pub motion: MotionSettings,
    /// Table geometry section
    #[serde(default)]
    pub table: TableSettings,
}

impl Config {
    /// Load configuration from a file, format chosen by extension
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = match extension(path) {
            Some("json") => serde_json::from_str(&text)?,
            Some("toml") => toml::from_str(&text)?,
            other => {
                return Err(SettingsError::UnsupportedFormat(
                    other.unwrap_or("<none>").to_string(),
                ))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file, format chosen by extension
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let text = match extension(path) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string_pretty(self)?,
            other => {
                return Err(SettingsError::UnsupportedFormat(
                    other.unwrap_or("<none>").to_string(),
                ))
            }
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Validate all sections
    pub fn validate(&self) -> Result<()> {
        if self.connection.baud_rate == 0 {
            return Err(SettingsError::InvalidSetting {
                key: "connection.baud_rate".to_string(),
                reason: "must be non-zero".to_string(),
            });
        }
        if !(self.motion.max_step_distance_mm.is_finite()
            && self.motion.max_step_distance_mm > 0.0)
        {
            return Err(SettingsError::InvalidSetting {
                key: "motion.max_step_distance_mm".to_string(),
                reason: "must be a positive finite distance".to_string(),
            });
        }
        if self.motion.ack_timeout_ms == 0 {
            return Err(SettingsError::InvalidSetting {
                key: "motion.ack_timeout_ms".to_string(),
                reason: "must be non-zero".to_string(),
            });
        }
        if self.motion.retry_budget == 0 {
            return Err(SettingsError::InvalidSetting {
                key: "motion.retry_budget".to_string(),
                reason: "at least one transmission is required".to_string(),
            });
        }
        if self.table.inner_radius_mm < 0.0
            || self.table.workspace_radius_mm <= self.table.inner_radius_mm
        {
            return Err(SettingsError::InvalidSetting {
                key: "table.workspace_radius_mm".to_string(),
                reason: "outer radius must exceed inner radius".to_string(),
            });
        }
        Ok(())
    }

    /// Platform default location of the configuration file
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| SettingsError::ConfigDirectory("no config directory".to_string()))?;
        Ok(base.join("psamathe").join("config.json"))
    }

    /// Load from the default location, falling back to defaults when the
    /// file does not exist yet
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.connection.baud_rate, 115_200);
        assert_eq!(config.motion.retry_budget, 3);
        assert!((config.motion.max_step_distance_mm - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.motion.max_step_distance_mm = 0.0;
        assert!(matches!(
            config.validate(),
            Err(SettingsError::InvalidSetting { .. })
        ));

        let mut config = Config::default();
        config.table.workspace_radius_mm = 10.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.connection.port = "/dev/ttyACM0".to_string();
        config.motion.retry_budget = 5;
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.connection.port, "/dev/ttyACM0");
        assert_eq!(loaded.motion.retry_budget, 5);
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::default();
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.connection.baud_rate, config.connection.baud_rate);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        let err = Config::default().save_to_file(&path).unwrap_err();
        assert!(matches!(err, SettingsError::UnsupportedFormat(_)));
    }
}
