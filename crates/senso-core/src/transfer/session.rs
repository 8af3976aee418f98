//! Transfer session state.
//!
//! Pure bookkeeping, no I/O: the server feeds packets in and performs the
//! returned step.

use super::packet::Packet;
use crate::protocol::constants::TRANSFER_BLOCK_SIZE;

/// What to do after a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Acknowledge `block`; `last` ends the session once the ack is sent.
    Ack { block: u16, last: bool },
    /// Drop the packet silently.
    Ignore,
    /// Log the opcode and drop the packet.
    Unsupported(u16),
}

/// Mutable state of one firmware transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferState {
    /// `None` until the first write request.
    expected_block: Option<u16>,
    bytes_received: u64,
}

impl TransferState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expected_block(&self) -> Option<u16> {
        self.expected_block
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn handle(&mut self, packet: &Packet<'_>) -> Step {
        match *packet {
            Packet::WriteRequest => {
                self.expected_block = Some(1);
                self.bytes_received = 0;
                Step::Ack {
                    block: 0,
                    last: false,
                }
            }
            Packet::Data { block, data } => {
                // Out-of-order blocks are dropped without a NACK.
                if self.expected_block != Some(block) {
                    return Step::Ignore;
                }
                self.bytes_received += data.len() as u64;
                let last = data.len() < TRANSFER_BLOCK_SIZE;
                if !last {
                    self.expected_block = Some(block.wrapping_add(1));
                }
                Step::Ack { block, last }
            }
            Packet::Unsupported(opcode) => Step::Unsupported(opcode),
            Packet::Malformed => Step::Ignore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(block: u16, len: usize) -> (u16, Vec<u8>) {
        (block, vec![0xAB; len])
    }

    fn handle_data(state: &mut TransferState, (block, bytes): &(u16, Vec<u8>)) -> Step {
        state.handle(&Packet::Data {
            block: *block,
            data: bytes,
        })
    }

    #[test]
    fn test_full_transfer() {
        let mut state = TransferState::new();
        assert_eq!(
            state.handle(&Packet::WriteRequest),
            Step::Ack {
                block: 0,
                last: false
            }
        );
        assert_eq!(state.expected_block(), Some(1));

        assert_eq!(
            handle_data(&mut state, &data(1, 512)),
            Step::Ack {
                block: 1,
                last: false
            }
        );
        assert_eq!(
            handle_data(&mut state, &data(2, 100)),
            Step::Ack {
                block: 2,
                last: true
            }
        );
        assert_eq!(state.bytes_received(), 612);
    }

    #[test]
    fn test_out_of_order_block_ignored() {
        let mut state = TransferState::new();
        state.handle(&Packet::WriteRequest);
        assert_eq!(handle_data(&mut state, &data(2, 512)), Step::Ignore);
        assert_eq!(state.bytes_received(), 0);
        assert_eq!(state.expected_block(), Some(1));

        handle_data(&mut state, &data(1, 512));
        // Retransmission of an acknowledged block.
        assert_eq!(handle_data(&mut state, &data(1, 512)), Step::Ignore);
        assert_eq!(state.bytes_received(), 512);
    }

    #[test]
    fn test_data_before_write_request_ignored() {
        let mut state = TransferState::new();
        assert_eq!(handle_data(&mut state, &data(0, 10)), Step::Ignore);
        assert_eq!(handle_data(&mut state, &data(1, 10)), Step::Ignore);
    }

    #[test]
    fn test_write_request_resets_session() {
        let mut state = TransferState::new();
        state.handle(&Packet::WriteRequest);
        handle_data(&mut state, &data(1, 512));
        handle_data(&mut state, &data(2, 512));

        state.handle(&Packet::WriteRequest);
        assert_eq!(state.expected_block(), Some(1));
        assert_eq!(state.bytes_received(), 0);
    }

    #[test]
    fn test_empty_final_block() {
        let mut state = TransferState::new();
        state.handle(&Packet::WriteRequest);
        handle_data(&mut state, &data(1, 512));
        assert_eq!(
            handle_data(&mut state, &data(2, 0)),
            Step::Ack {
                block: 2,
                last: true
            }
        );
    }

    #[test]
    fn test_unsupported_opcode() {
        let mut state = TransferState::new();
        assert_eq!(state.handle(&Packet::Unsupported(1)), Step::Unsupported(1));
        assert_eq!(state.handle(&Packet::Malformed), Step::Ignore);
    }
}
