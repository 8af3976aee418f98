//! Firmware transfer protocol.
//!
//! A minimal block-acknowledged transfer over datagrams: a write request
//! opens the session, numbered data blocks are acknowledged one by one, and
//! the first block shorter than 512 bytes ends it.

pub mod packet;
pub mod server;
pub mod session;

use std::fmt;

pub use packet::{Packet, ack, parse_ack};
pub use server::{TransferError, TransferSummary, receive_firmware};
pub use session::{Step, TransferState};

/// How a transfer session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed { bytes_received: u64 },
    Failed(String),
    /// Stopped from outside, counted as a failure.
    Cancelled,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { bytes_received } => write!(f, "completed, {bytes_received} bytes"),
            Self::Failed(e) => write!(f, "failed: {e}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
