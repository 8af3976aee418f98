//! Command type parsing and naming.
//!
//! Unknown command types are kept as-is; the device acknowledges them with a
//! standard response instead of rejecting them.

use std::fmt;

use super::constants::{CMD_ENTER_DFU, CMD_GET_DEV_INFO, CMD_GET_STATUS};

/// Command type carried in a request block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    GetStatus,
    GetDevInfo,
    EnterDfu,
    /// Any other block type.
    Other(u16),
}

impl Command {
    pub const fn from_u16(raw: u16) -> Self {
        match raw {
            CMD_GET_STATUS => Self::GetStatus,
            CMD_GET_DEV_INFO => Self::GetDevInfo,
            CMD_ENTER_DFU => Self::EnterDfu,
            other => Self::Other(other),
        }
    }

    /// Raw block type as sent by the driver.
    pub const fn raw(&self) -> u16 {
        match self {
            Self::GetStatus => CMD_GET_STATUS,
            Self::GetDevInfo => CMD_GET_DEV_INFO,
            Self::EnterDfu => CMD_ENTER_DFU,
            Self::Other(raw) => *raw,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GetStatus => "GET_STATUS",
            Self::GetDevInfo => "GET_DEV_INFO",
            Self::EnterDfu => "ENTER_DFU",
            Self::Other(_) => "<unknown>",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<u16> for Command {
    fn from(raw: u16) -> Self {
        Self::from_u16(raw)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Comma separated command names, for log lines.
pub fn describe(commands: &[Command]) -> String {
    commands
        .iter()
        .map(Command::name)
        .collect::<Vec<_>>()
        .join(", ")
}
