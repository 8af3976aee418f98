//! Datagram transport abstraction.
//!
//! Defines the `DatagramSocket` trait used by the firmware transfer,
//! allowing different implementations (tokio UDP, mock).

use std::future::Future;
use std::io;
use std::net::SocketAddr;

/// Abstract datagram socket.
///
/// This trait enables:
/// - Production implementation on `tokio::net::UdpSocket`
/// - Mock implementation for unit testing the transfer without a network
pub trait DatagramSocket: Send + Sync {
    /// Receive one datagram into `buf`, returning its length and sender.
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;

    /// Send one datagram to `target`.
    fn send_to(
        &self,
        buf: &[u8],
        target: SocketAddr,
    ) -> impl Future<Output = io::Result<usize>> + Send;

    /// Address the socket is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}
