//! Startup configuration of the simulated device.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::profile::{FirmwareVersion, VersionError};
use crate::protocol::constants::{CONTROL_PORT, UPDATE_PORT};
use crate::replay::ReplayOptions;
use crate::state::DeviceMode;

/// Pause between stopping one mode and starting the next, modelling the
/// device reboot.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 5000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error(transparent)]
    Version(#[from] VersionError),
    #[error("Playback speed must be a positive number, got {0}")]
    InvalidSpeed(f64),
}

/// Configuration for a simulated device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Boot into Bootloader (DFU) mode instead of Application mode.
    pub start_in_dfu: bool,
    /// Firmware version reported by `GET_DEV_INFO`, as `major.minor.patch`.
    pub firmware_version: String,
    /// Recording replayed as sensor data. None disables sensor data.
    pub recording: Option<PathBuf>,
    /// Restart the recording when it ends.
    pub replay_loop: bool,
    /// Playback speed multiplier.
    pub speed: f64,
    /// Address both listeners bind to.
    pub host: IpAddr,
    pub control_port: u16,
    pub update_port: u16,
    pub settle_delay_ms: u64,
    /// Publish discovery records.
    pub advertise: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            start_in_dfu: false,
            firmware_version: FirmwareVersion::default().to_string(),
            recording: None,
            replay_loop: true,
            speed: 1.0,
            // Reachable through the address discovery reports.
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            control_port: CONTROL_PORT,
            update_port: UPDATE_PORT,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            advertise: true,
        }
    }
}

impl DeviceConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: DeviceConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.firmware()?;
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(ConfigError::InvalidSpeed(self.speed));
        }
        Ok(())
    }

    pub fn firmware(&self) -> Result<FirmwareVersion, VersionError> {
        self.firmware_version.parse()
    }

    pub fn initial_mode(&self) -> DeviceMode {
        if self.start_in_dfu {
            DeviceMode::Bootloader
        } else {
            DeviceMode::Application
        }
    }

    pub fn replay_options(&self) -> ReplayOptions {
        ReplayOptions {
            looping: self.replay_loop,
            speed: self.speed,
        }
    }

    pub fn control_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.control_port)
    }

    pub fn update_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.update_port)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeviceConfig::default();
        assert_eq!(config.initial_mode(), DeviceMode::Application);
        assert_eq!(config.firmware().unwrap(), FirmwareVersion::default());
        assert_eq!(config.control_addr().port(), 55567);
        assert_eq!(config.update_addr().port(), 6969);
        assert_eq!(config.settle_delay(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_roundtrip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("senso.toml");
        let config = DeviceConfig {
            start_in_dfu: true,
            firmware_version: "2.0.1".into(),
            recording: Some(PathBuf::from("rec.dat")),
            speed: 0.5,
            ..Default::default()
        };
        config.save_to_file(&path).unwrap();
        assert_eq!(DeviceConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("senso.toml");
        std::fs::write(&path, "control_port = 1234\nreplay_loop = false\n").unwrap();
        let config = DeviceConfig::load_from_file(&path).unwrap();
        assert_eq!(config.control_port, 1234);
        assert!(!config.replay_loop);
        assert_eq!(config.update_port, 6969);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_speed = DeviceConfig {
            speed: 0.0,
            ..Default::default()
        };
        assert!(matches!(bad_speed.validate(), Err(ConfigError::InvalidSpeed(_))));

        let bad_version = DeviceConfig {
            firmware_version: "3.3".into(),
            ..Default::default()
        };
        assert!(matches!(bad_version.validate(), Err(ConfigError::Version(_))));
    }

    #[test]
    fn test_tiny_speed_is_valid_and_saturates() {
        let config = DeviceConfig {
            speed: 1e-300,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        let delay = config.replay_options().scale(Duration::from_millis(20));
        assert_eq!(delay, crate::replay::MAX_SCALED_DELAY);
    }
}
