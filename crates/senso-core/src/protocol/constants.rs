//! Protocol constants for the Senso control and firmware update protocols.

// ============================================================================
// Control Protocol (TCP)
// ============================================================================

/// Protocol version written into every response header.
pub const PROTOCOL_VERSION: u8 = 1;

/// Fixed frame header: version, block count, 6 reserved bytes.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Block header: u16 length + u16 type, both little-endian.
pub const BLOCK_HEADER_SIZE: usize = 4;

/// Bit set on the block type of every response block.
pub const RESPONSE_FLAG: u16 = 0x8000;

/// Default TCP port of the control listener.
pub const CONTROL_PORT: u16 = 55567;

// ============================================================================
// Commands (Driver -> Device)
// ============================================================================

pub const CMD_GET_STATUS: u16 = 0x00D0;
pub const CMD_GET_DEV_INFO: u16 = 0x00D1;
pub const CMD_ENTER_DFU: u16 = 0x00F0;

// ============================================================================
// Response payload sizes
// ============================================================================

/// Six board status records of 20 bytes each.
pub const STATUS_BLOCK_LENGTH: usize = 120;
pub const STATUS_RECORD_LENGTH: usize = 20;

/// Device serial, hardware id, reserved, six board descriptors.
pub const DEV_INFO_BLOCK_LENGTH: usize = 168;
pub const DEV_INFO_ITEM_LENGTH: usize = 24;

/// returnCode, status, error as u32, rest zero.
pub const STANDARD_BLOCK_LENGTH: usize = 24;

/// Width of every serial number field.
pub const SERIAL_LENGTH: usize = 16;

/// Number of boards: controller plus five peripherals.
pub const BOARD_COUNT: usize = 6;

// ============================================================================
// Sensor data stream
// ============================================================================

/// Block type marker of sensor data frames in a recording.
pub const DATA_TYPE_SENSOR: u8 = 0x80;

/// Absolute offset of the data type byte (body offset 2).
pub const DATA_TYPE_OFFSET: usize = FRAME_HEADER_SIZE + 2;

// ============================================================================
// Firmware Transfer Protocol (UDP)
// ============================================================================

/// Default UDP port of the firmware listener. Above 1024 so no privileges
/// are needed.
pub const UPDATE_PORT: u16 = 6969;

pub const OP_WRITE_REQUEST: u16 = 2;
pub const OP_DATA: u16 = 3;
pub const OP_ACK: u16 = 4;

/// A data block shorter than this ends the transfer.
pub const TRANSFER_BLOCK_SIZE: usize = 512;

/// Opcode + block number.
pub const TRANSFER_HEADER_SIZE: usize = 4;
