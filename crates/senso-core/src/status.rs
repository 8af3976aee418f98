//! Board status records returned by `GET_STATUS`.

use byteorder::{ByteOrder, LittleEndian};

use crate::protocol::constants::{BOARD_COUNT, STATUS_BLOCK_LENGTH, STATUS_RECORD_LENGTH};

/// Named status flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum StatusFlag {
    Busy = 0x0000_0001,
    MeasurementRunning = 0x0000_0002,
    Calibrated = 0x0000_0004,
    Calibrating = 0x0000_0008,
    NoSignal = 0x1000_0000,
    Upgrading = 0x4000_0000,
    SystemErrorPresent = 0x8000_0000,
}

impl StatusFlag {
    pub const ALL: [StatusFlag; 7] = [
        Self::Busy,
        Self::MeasurementRunning,
        Self::Calibrated,
        Self::Calibrating,
        Self::NoSignal,
        Self::Upgrading,
        Self::SystemErrorPresent,
    ];

    pub const fn bits(self) -> u32 {
        self as u32
    }
}

/// Named error flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorFlag {
    GeneralError = 0x0000_0001,
    CommandFailed = 0x0000_0002,
    CommandUnknown = 0x0000_0004,
    Communication = 0x0001_0000,
    LedBoard = 0x0002_0000,
    V3_3Supply = 0x0010_0000,
    V5Supply = 0x0020_0000,
    V12MotorSupply = 0x0040_0000,
    V12LedSupply = 0x0080_0000,
    V19LedSupply = 0x0100_0000,
    OverTemperature = 0x0200_0000,
}

impl ErrorFlag {
    pub const ALL: [ErrorFlag; 11] = [
        Self::GeneralError,
        Self::CommandFailed,
        Self::CommandUnknown,
        Self::Communication,
        Self::LedBoard,
        Self::V3_3Supply,
        Self::V5Supply,
        Self::V12MotorSupply,
        Self::V12LedSupply,
        Self::V19LedSupply,
        Self::OverTemperature,
    ];

    pub const fn bits(self) -> u32 {
        self as u32
    }
}

fn combine<F: Copy>(flags: &[F], bits: impl Fn(F) -> u32) -> u32 {
    flags.iter().fold(0, |acc, &f| acc | bits(f))
}

fn split<F: Copy>(mask: u32, all: &[F], bits: impl Fn(F) -> u32) -> Vec<F> {
    all.iter().copied().filter(|&f| mask & bits(f) != 0).collect()
}

/// Operational snapshot of one board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardStatus {
    pub status: Vec<StatusFlag>,
    pub error: Vec<ErrorFlag>,
    pub vcc3_3: u16,
    pub vcc5: u16,
    pub vcc12_motor: u16,
    pub vcc12_led: u16,
    pub vcc19_led: u16,
    pub temperature: i16,
}

impl Default for BoardStatus {
    fn default() -> Self {
        Self {
            status: Vec::new(),
            error: Vec::new(),
            vcc3_3: 3300,
            vcc5: 5000,
            vcc12_motor: 12000,
            vcc12_led: 12000,
            vcc19_led: 19000,
            temperature: 25,
        }
    }
}

impl BoardStatus {
    pub const SIZE: usize = STATUS_RECORD_LENGTH;

    pub fn status_bits(&self) -> u32 {
        combine(&self.status, StatusFlag::bits)
    }

    pub fn error_bits(&self) -> u32 {
        combine(&self.error, ErrorFlag::bits)
    }

    /// Fixed field order: status u32, error u32, five rails u16, temperature i16.
    pub fn to_bytes(&self) -> [u8; STATUS_RECORD_LENGTH] {
        let mut buf = [0u8; STATUS_RECORD_LENGTH];
        LittleEndian::write_u32(&mut buf[0..4], self.status_bits());
        LittleEndian::write_u32(&mut buf[4..8], self.error_bits());
        LittleEndian::write_u16(&mut buf[8..10], self.vcc3_3);
        LittleEndian::write_u16(&mut buf[10..12], self.vcc5);
        LittleEndian::write_u16(&mut buf[12..14], self.vcc12_motor);
        LittleEndian::write_u16(&mut buf[14..16], self.vcc12_led);
        LittleEndian::write_u16(&mut buf[16..18], self.vcc19_led);
        LittleEndian::write_i16(&mut buf[18..20], self.temperature);
        buf
    }

    /// Unknown flag bits are dropped.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < STATUS_RECORD_LENGTH {
            return None;
        }
        Some(Self {
            status: split(
                LittleEndian::read_u32(&data[0..4]),
                &StatusFlag::ALL,
                StatusFlag::bits,
            ),
            error: split(
                LittleEndian::read_u32(&data[4..8]),
                &ErrorFlag::ALL,
                ErrorFlag::bits,
            ),
            vcc3_3: LittleEndian::read_u16(&data[8..10]),
            vcc5: LittleEndian::read_u16(&data[10..12]),
            vcc12_motor: LittleEndian::read_u16(&data[12..14]),
            vcc12_led: LittleEndian::read_u16(&data[14..16]),
            vcc19_led: LittleEndian::read_u16(&data[16..18]),
            temperature: LittleEndian::read_i16(&data[18..20]),
        })
    }
}

/// Status of all six boards, controller first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub boards: [BoardStatus; BOARD_COUNT],
}

impl Default for StatusReport {
    /// Only the controller reports flags: a running, calibrated measurement.
    fn default() -> Self {
        let mut boards: [BoardStatus; BOARD_COUNT] = Default::default();
        boards[0].status = vec![StatusFlag::MeasurementRunning, StatusFlag::Calibrated];
        Self { boards }
    }
}

impl StatusReport {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(STATUS_BLOCK_LENGTH);
        for board in &self.boards {
            buf.extend_from_slice(&board.to_bytes());
        }
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < STATUS_BLOCK_LENGTH {
            return None;
        }
        let mut boards: [BoardStatus; BOARD_COUNT] = Default::default();
        for (i, chunk) in data[..STATUS_BLOCK_LENGTH]
            .chunks_exact(STATUS_RECORD_LENGTH)
            .enumerate()
        {
            boards[i] = BoardStatus::from_bytes(chunk)?;
        }
        Some(Self { boards })
    }
}
