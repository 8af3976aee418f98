//! Device identity: serial numbers and firmware version.
//!
//! The profile is created once at startup and shared read-only by both
//! operating modes.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::protocol::constants::{
    BOARD_COUNT, DEV_INFO_BLOCK_LENGTH, DEV_INFO_ITEM_LENGTH, SERIAL_LENGTH,
};

/// Fabricated hardware identifier reported in `GET_DEV_INFO`.
pub const HARDWARE_ID: [u8; 6] = [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE];

/// Board names in wire order.
pub const BOARD_NAMES: [&str; BOARD_COUNT] = ["controller", "center", "up", "right", "down", "left"];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid semver string: {0}")]
    Invalid(String),
}

/// Firmware version with distinct numeric fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub feature: u8,
    pub fix: u8,
}

impl Default for FirmwareVersion {
    fn default() -> Self {
        Self {
            major: 3,
            minor: 3,
            patch: 3,
            feature: 3,
            fix: 3,
        }
    }
}

impl FirmwareVersion {
    /// Version with default feature and fix fields.
    pub fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
            ..Default::default()
        }
    }
}

impl FromStr for FirmwareVersion {
    type Err = VersionError;

    /// Accepts exactly `major.minor.patch`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || VersionError::Invalid(s.to_string());
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }
        let mut nums = [0u8; 3];
        for (slot, part) in nums.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            *slot = part.parse().map_err(|_| invalid())?;
        }
        Ok(Self::new(nums[0], nums[1], nums[2]))
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Immutable identity data of the simulated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProfile {
    pub serial: String,
    /// Controller first, then center, up, right, down, left.
    pub board_serials: [String; BOARD_COUNT],
    pub firmware: FirmwareVersion,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            serial: "10-00000000".to_string(),
            board_serials: std::array::from_fn(|i| format!("10-0000000{}", i + 1)),
            firmware: FirmwareVersion::default(),
        }
    }
}

impl DeviceProfile {
    pub fn with_firmware(firmware: FirmwareVersion) -> Self {
        Self {
            firmware,
            ..Default::default()
        }
    }

    /// `GET_DEV_INFO` payload (168 bytes).
    pub fn device_info(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(DEV_INFO_BLOCK_LENGTH);
        buf.extend_from_slice(&serial_field(&self.serial));
        buf.extend_from_slice(&HARDWARE_ID);
        buf.extend_from_slice(&[0, 0]);
        for serial in &self.board_serials {
            buf.extend_from_slice(&self.board_descriptor(serial));
        }
        buf
    }

    /// Software version (fix, feature, minor, major), 4 bytes hardware
    /// version (always zero), 16 bytes serial.
    fn board_descriptor(&self, serial: &str) -> [u8; DEV_INFO_ITEM_LENGTH] {
        let mut item = [0u8; DEV_INFO_ITEM_LENGTH];
        item[0] = self.firmware.fix;
        item[1] = self.firmware.feature;
        item[2] = self.firmware.minor;
        item[3] = self.firmware.major;
        item[8..].copy_from_slice(&serial_field(serial));
        item
    }
}

/// ASCII serial, zero-padded or truncated to 16 bytes.
fn serial_field(serial: &str) -> [u8; SERIAL_LENGTH] {
    let mut field = [0u8; SERIAL_LENGTH];
    let ascii = serial.as_bytes().iter().filter(|b| b.is_ascii());
    for (dst, src) in field.iter_mut().zip(ascii) {
        *dst = *src;
    }
    field
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        let v: FirmwareVersion = "4.2.1".parse().unwrap();
        assert_eq!((v.major, v.minor, v.patch), (4, 2, 1));
        assert_eq!((v.feature, v.fix), (3, 3));
        assert_eq!(v.to_string(), "4.2.1");
    }

    #[test]
    fn test_parse_version_rejects_garbage() {
        for s in ["", "1.2", "1.2.3.4", "a.b.c", "1..2", "1.2.-3", "1.2.300", "+1.2.3"] {
            assert!(s.parse::<FirmwareVersion>().is_err(), "{s} should be rejected");
        }
    }

    #[test]
    fn test_default_serials() {
        let profile = DeviceProfile::default();
        assert_eq!(profile.serial, "10-00000000");
        assert_eq!(profile.board_serials[0], "10-00000001");
        assert_eq!(profile.board_serials[5], "10-00000006");
    }

    #[test]
    fn test_device_info_layout() {
        let profile = DeviceProfile::with_firmware(FirmwareVersion {
            major: 1,
            minor: 2,
            patch: 9,
            feature: 4,
            fix: 5,
        });
        let info = profile.device_info();
        assert_eq!(info.len(), DEV_INFO_BLOCK_LENGTH);
        assert_eq!(&info[0..11], b"10-00000000");
        assert_eq!(&info[11..16], &[0; 5]);
        assert_eq!(&info[16..22], &HARDWARE_ID);
        assert_eq!(&info[22..24], &[0, 0]);

        let controller = &info[24..48];
        assert_eq!(&controller[0..4], &[5, 4, 2, 1]);
        assert_eq!(&controller[4..8], &[0; 4]);
        assert_eq!(&controller[8..19], b"10-00000001");
    }

    #[test]
    fn test_long_serial_truncated() {
        let field = serial_field("ABCDEFGHIJKLMNOPQRSTUVWXYZ");
        assert_eq!(&field, b"ABCDEFGHIJKLMNOP");
    }
}
