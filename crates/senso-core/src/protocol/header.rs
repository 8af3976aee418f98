//! Frame and block headers of the control protocol.
//!
//! Layout of every frame, requests and responses alike:
//!
//! ```text
//! [0]      protocol version
//! [1]      number of blocks
//! [2..8]   reserved
//! [8..]    blocks: u16 LE length | u16 LE type | `length` payload bytes
//! ```
//!
//! Parsing is best-effort: a truncated or inconsistent frame yields fewer
//! blocks than declared and never an error.

use byteorder::{ByteOrder, LittleEndian};

use super::command::Command;
use super::constants::{BLOCK_HEADER_SIZE, FRAME_HEADER_SIZE};

/// Fixed 8-byte frame header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u8,
    pub block_count: u8,
}

impl FrameHeader {
    pub const SIZE: usize = FRAME_HEADER_SIZE;

    pub fn new(version: u8, block_count: u8) -> Self {
        Self {
            version,
            block_count,
        }
    }

    /// Missing bytes read as zero.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self {
            version: data.first().copied().unwrap_or(0),
            block_count: data.get(1).copied().unwrap_or(0),
        }
    }

    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        buf[0] = self.version;
        buf[1] = self.block_count;
        buf
    }
}

/// 4-byte block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Payload length in bytes (header excluded).
    pub length: u16,
    /// Raw block type, including the response bit if set.
    pub block_type: u16,
}

impl BlockHeader {
    pub const SIZE: usize = BLOCK_HEADER_SIZE;

    pub fn new(length: u16, block_type: u16) -> Self {
        Self { length, block_type }
    }

    pub fn to_bytes(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut buf = [0u8; BLOCK_HEADER_SIZE];
        LittleEndian::write_u16(&mut buf[0..2], self.length);
        LittleEndian::write_u16(&mut buf[2..4], self.block_type);
        buf
    }

    /// Returns `None` if fewer than 4 bytes are available.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < BLOCK_HEADER_SIZE {
            return None;
        }
        Some(Self {
            length: LittleEndian::read_u16(&data[0..2]),
            block_type: LittleEndian::read_u16(&data[2..4]),
        })
    }
}

/// Iterator over the block headers of a frame body.
///
/// Stops when the declared count is exhausted or the body is consumed,
/// whichever comes first.
pub struct BlockHeaders<'a> {
    body: &'a [u8],
    offset: usize,
    remaining: u8,
}

impl<'a> BlockHeaders<'a> {
    pub fn new(body: &'a [u8], declared: u8) -> Self {
        Self {
            body,
            offset: 0,
            remaining: declared,
        }
    }
}

impl Iterator for BlockHeaders<'_> {
    type Item = BlockHeader;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 || self.offset >= self.body.len() {
            return None;
        }
        let header = BlockHeader::from_bytes(&self.body[self.offset..])?;
        self.offset = self
            .offset
            .saturating_add(BLOCK_HEADER_SIZE + header.length as usize);
        self.remaining -= 1;
        Some(header)
    }
}

/// A decoded control frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlFrame {
    pub header: FrameHeader,
    pub blocks: Vec<BlockHeader>,
}

impl ControlFrame {
    pub fn parse(data: &[u8]) -> Self {
        let header = FrameHeader::from_bytes(data);
        let body = data.get(FRAME_HEADER_SIZE..).unwrap_or(&[]);
        Self {
            header,
            blocks: BlockHeaders::new(body, header.block_count).collect(),
        }
    }

    pub fn version(&self) -> u8 {
        self.header.version
    }

    /// Command types in frame order.
    pub fn commands(&self) -> Vec<Command> {
        self.blocks
            .iter()
            .map(|b| Command::from_u16(b.block_type))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(blocks: &[(u16, u16)], declared: u8) -> Vec<u8> {
        let mut data = FrameHeader::new(1, declared).to_bytes().to_vec();
        for &(len, ty) in blocks {
            data.extend_from_slice(&BlockHeader::new(len, ty).to_bytes());
            data.extend(std::iter::repeat_n(0xAA, len as usize));
        }
        data
    }

    #[test]
    fn test_single_command() {
        let data = [1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0xF0, 0x00];
        let parsed = ControlFrame::parse(&data);
        assert_eq!(parsed.version(), 1);
        assert_eq!(parsed.commands(), vec![Command::EnterDfu]);
    }

    #[test]
    fn test_multiple_blocks_with_bodies() {
        let data = frame(&[(3, 0x00D0), (0, 0x00D1), (10, 0x0042)], 3);
        let parsed = ControlFrame::parse(&data);
        assert_eq!(
            parsed.commands(),
            vec![
                Command::GetStatus,
                Command::GetDevInfo,
                Command::Other(0x0042)
            ]
        );
    }

    #[test]
    fn test_declared_count_limits_blocks() {
        let data = frame(&[(0, 0x00D0), (0, 0x00D1)], 1);
        assert_eq!(ControlFrame::parse(&data).commands(), vec![Command::GetStatus]);
    }

    #[test]
    fn test_truncated_body_yields_fewer_blocks() {
        // Declares 3 blocks, the first claims a body longer than the frame.
        let data = frame(&[(0, 0x00D1)], 3);
        let mut data = data;
        data.extend_from_slice(&BlockHeader::new(500, 0x00D0).to_bytes());
        let parsed = ControlFrame::parse(&data);
        assert_eq!(parsed.commands(), vec![Command::GetDevInfo, Command::GetStatus]);
    }

    #[test]
    fn test_short_input_is_tolerated() {
        assert!(ControlFrame::parse(&[]).blocks.is_empty());
        assert!(ControlFrame::parse(&[1, 4, 0]).blocks.is_empty());
        // Two stray bytes after the header are not a block header.
        assert!(ControlFrame::parse(&[1, 1, 0, 0, 0, 0, 0, 0, 0xD0, 0x00]).blocks.is_empty());
    }

    #[test]
    fn test_block_header_layout() {
        let bytes = BlockHeader::new(120, 0x80D0).to_bytes();
        assert_eq!(bytes, [120, 0, 0xD0, 0x80]);
        assert_eq!(BlockHeader::from_bytes(&bytes), Some(BlockHeader::new(120, 0x80D0)));
    }
}
