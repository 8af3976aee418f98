//! Response frames for decoded command lists.

use byteorder::{ByteOrder, LittleEndian};

use super::command::Command;
use super::constants::{PROTOCOL_VERSION, RESPONSE_FLAG, STANDARD_BLOCK_LENGTH};
use super::header::{BlockHeader, FrameHeader};
use crate::profile::DeviceProfile;
use crate::status::StatusReport;

/// One response block: a command type and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Command type the block answers, without the response bit.
    pub command: u16,
    pub payload: Vec<u8>,
}

impl Block {
    pub fn new(command: u16, payload: Vec<u8>) -> Self {
        Self { command, payload }
    }

    /// Header with the response bit set on the type.
    pub fn header(&self) -> BlockHeader {
        BlockHeader::new(self.payload.len() as u16, self.command | RESPONSE_FLAG)
    }
}

/// A response frame: header followed by blocks in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub version: u8,
    pub blocks: Vec<Block>,
}

impl ResponseFrame {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            blocks,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let body_len: usize = self
            .blocks
            .iter()
            .map(|b| BlockHeader::SIZE + b.payload.len())
            .sum();
        let mut buf = Vec::with_capacity(FrameHeader::SIZE + body_len);
        buf.extend_from_slice(&FrameHeader::new(self.version, self.blocks.len() as u8).to_bytes());
        for block in &self.blocks {
            buf.extend_from_slice(&block.header().to_bytes());
            buf.extend_from_slice(&block.payload);
        }
        buf
    }
}

/// What the device does with a decoded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Write this frame back on the connection.
    Frame(ResponseFrame),
    /// Leave Application mode; nothing is written.
    EnterDfu,
    /// No commands were decoded; nothing is written.
    Nothing,
}

/// Standard acknowledgement payload: returnCode, status, error.
pub fn standard_payload(return_code: u32, status: u32, error: u32) -> Vec<u8> {
    let mut buf = vec![0u8; STANDARD_BLOCK_LENGTH];
    LittleEndian::write_u32(&mut buf[0..4], return_code);
    LittleEndian::write_u32(&mut buf[4..8], status);
    LittleEndian::write_u32(&mut buf[8..12], error);
    buf
}

/// Builds responses from the device profile and board status.
#[derive(Debug, Clone, Default)]
pub struct Responder {
    profile: DeviceProfile,
    status: StatusReport,
}

impl Responder {
    pub fn new(profile: DeviceProfile, status: StatusReport) -> Self {
        Self { profile, status }
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    /// `ENTER_DFU` anywhere in the list takes precedence over every other
    /// command. An empty list gets no reply at all.
    pub fn respond(&self, commands: &[Command]) -> Response {
        if commands.contains(&Command::EnterDfu) {
            return Response::EnterDfu;
        }
        if commands.is_empty() {
            return Response::Nothing;
        }
        let blocks = commands.iter().map(|cmd| self.block_for(*cmd)).collect();
        Response::Frame(ResponseFrame::new(blocks))
    }

    fn block_for(&self, command: Command) -> Block {
        let payload = match command {
            Command::GetStatus => self.status.to_bytes(),
            Command::GetDevInfo => self.profile.device_info(),
            _ => standard_payload(0, 0, 0),
        };
        Block::new(command.raw(), payload)
    }
}
