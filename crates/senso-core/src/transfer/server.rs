//! Transfer session driver over a datagram socket.

use std::net::SocketAddr;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::packet::{Packet, ack};
use super::session::{Step, TransferState};
use crate::events::{DeviceEvent, DeviceObserver};
use crate::transport::DatagramSocket;

/// Largest datagram accepted.
const MAX_DATAGRAM: usize = 65536;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Socket receive failed: {0}")]
    Receive(#[source] std::io::Error),

    #[error("Failed to send ACK for block {block}: {source}")]
    Ack {
        block: u16,
        #[source]
        source: std::io::Error,
    },
}

/// A successfully completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    pub bytes_received: u64,
    pub last_block: u16,
    pub peer: SocketAddr,
}

/// Run one transfer session on `socket` until the final block has been
/// acknowledged.
///
/// Any socket error ends the session. The caller owns the socket and
/// closes it afterwards.
#[instrument(skip_all)]
pub async fn receive_firmware<S, O>(socket: &S, observer: &O) -> Result<TransferSummary, TransferError>
where
    S: DatagramSocket,
    O: DeviceObserver + ?Sized,
{
    let mut state = TransferState::new();
    let mut buf = vec![0u8; MAX_DATAGRAM];

    loop {
        let (n, peer) = socket
            .recv_from(&mut buf)
            .await
            .map_err(TransferError::Receive)?;
        let packet = Packet::parse(&buf[..n]);

        match state.handle(&packet) {
            Step::Ack { block, last } => {
                if block == 0 {
                    observer.on_event(&DeviceEvent::TransferStarted { peer });
                } else {
                    observer.on_event(&DeviceEvent::BlockReceived {
                        block,
                        bytes_received: state.bytes_received(),
                    });
                }

                socket
                    .send_to(&ack(block), peer)
                    .await
                    .map_err(|source| TransferError::Ack { block, source })?;

                if last {
                    info!(
                        total = state.bytes_received(),
                        "Last data packet received"
                    );
                    return Ok(TransferSummary {
                        bytes_received: state.bytes_received(),
                        last_block: block,
                        peer,
                    });
                }
            }
            Step::Ignore => {
                debug!(peer = %peer, len = n, "Ignoring datagram");
            }
            Step::Unsupported(opcode) => {
                warn!(opcode = opcode, peer = %peer, "Unsupported opcode received");
            }
        }
    }
}
