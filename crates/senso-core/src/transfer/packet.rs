//! Firmware transfer packets.
//!
//! All fields are big-endian, unlike the control protocol:
//!
//! ```text
//! write-request:  u16 opcode (2) | ...
//! data:           u16 opcode (3) | u16 block | data bytes
//! ack:            u16 opcode (4) | u16 block
//! ```

use byteorder::{BigEndian, ByteOrder};

use crate::protocol::constants::{OP_ACK, OP_DATA, OP_WRITE_REQUEST, TRANSFER_HEADER_SIZE};

/// A received datagram, classified by opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet<'a> {
    /// Starts (or restarts) a transfer. Filename and mode are not inspected.
    WriteRequest,
    Data { block: u16, data: &'a [u8] },
    /// Any other opcode.
    Unsupported(u16),
    /// Too short to carry an opcode, or a data packet without block number.
    Malformed,
}

impl<'a> Packet<'a> {
    pub fn parse(datagram: &'a [u8]) -> Self {
        if datagram.len() < 2 {
            return Self::Malformed;
        }
        match BigEndian::read_u16(&datagram[0..2]) {
            OP_WRITE_REQUEST => Self::WriteRequest,
            OP_DATA if datagram.len() < TRANSFER_HEADER_SIZE => Self::Malformed,
            OP_DATA => Self::Data {
                block: BigEndian::read_u16(&datagram[2..4]),
                data: &datagram[TRANSFER_HEADER_SIZE..],
            },
            other => Self::Unsupported(other),
        }
    }
}

/// Acknowledgement for `block`.
pub fn ack(block: u16) -> [u8; TRANSFER_HEADER_SIZE] {
    let mut buf = [0u8; TRANSFER_HEADER_SIZE];
    BigEndian::write_u16(&mut buf[0..2], OP_ACK);
    BigEndian::write_u16(&mut buf[2..4], block);
    buf
}

/// Block number of an acknowledgement, if `bytes` is one.
pub fn parse_ack(bytes: &[u8]) -> Option<u16> {
    if bytes.len() < TRANSFER_HEADER_SIZE || BigEndian::read_u16(&bytes[0..2]) != OP_ACK {
        return None;
    }
    Some(BigEndian::read_u16(&bytes[2..4]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_write_request() {
        assert_eq!(Packet::parse(b"\x00\x02firmware.bin\x00octet\x00"), Packet::WriteRequest);
        assert_eq!(Packet::parse(&[0, 2]), Packet::WriteRequest);
    }

    #[test]
    fn test_parse_data() {
        let datagram = [0, 3, 0x01, 0x02, 9, 8, 7];
        assert_eq!(
            Packet::parse(&datagram),
            Packet::Data {
                block: 0x0102,
                data: &[9, 8, 7]
            }
        );
        // Empty data is still a data packet.
        assert_eq!(Packet::parse(&[0, 3, 0, 1]), Packet::Data { block: 1, data: &[] });
    }

    #[test]
    fn test_parse_other() {
        assert_eq!(Packet::parse(&[0, 1, 0, 0]), Packet::Unsupported(1));
        assert_eq!(Packet::parse(&[0, 5]), Packet::Unsupported(5));
        assert_eq!(Packet::parse(&[0]), Packet::Malformed);
        assert_eq!(Packet::parse(&[0, 3, 0]), Packet::Malformed);
    }

    #[test]
    fn test_ack_layout() {
        assert_eq!(ack(0), [0, 4, 0, 0]);
        assert_eq!(ack(0x1234), [0, 4, 0x12, 0x34]);
        assert_eq!(parse_ack(&ack(513)), Some(513));
        assert_eq!(parse_ack(&[0, 3, 0, 1]), None);
    }
}
