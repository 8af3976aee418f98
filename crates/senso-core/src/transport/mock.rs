//! Mock datagram transport for testing.

use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;

use super::traits::DatagramSocket;

type Incoming = Result<(Vec<u8>, SocketAddr), io::ErrorKind>;

/// Mock socket for unit testing transfer logic.
pub struct MockDatagram {
    /// Queued datagrams to return on receive.
    inbox_tx: Mutex<Option<mpsc::UnboundedSender<Incoming>>>,
    inbox_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Incoming>>,
    /// Captured sends.
    sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
    /// Whether sends should fail.
    fail_sends: AtomicBool,
    local: SocketAddr,
}

impl MockDatagram {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inbox_tx: Mutex::new(Some(tx)),
            inbox_rx: tokio::sync::Mutex::new(rx),
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            local: SocketAddr::from((Ipv4Addr::LOCALHOST, 6969)),
        }
    }

    fn push(&self, item: Incoming) {
        if let Some(tx) = self.inbox_tx.lock().unwrap().as_ref() {
            let _ = tx.send(item);
        }
    }

    /// Queue a datagram to be returned on a later receive.
    pub fn queue(&self, data: &[u8], from: SocketAddr) {
        self.push(Ok((data.to_vec(), from)));
    }

    /// Queue a receive error.
    pub fn queue_error(&self, kind: io::ErrorKind) {
        self.push(Err(kind));
    }

    /// Receives fail with `ConnectionAborted` once the queue drains.
    pub fn close(&self) {
        self.inbox_tx.lock().unwrap().take();
    }

    /// Make every following send fail.
    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    /// All captured sends.
    pub fn get_sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for MockDatagram {
    fn default() -> Self {
        Self::new()
    }
}

impl DatagramSocket for MockDatagram {
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send {
        async move {
            let mut rx = self.inbox_rx.lock().await;
            match rx.recv().await {
                Some(Ok((data, from))) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok((n, from))
                }
                Some(Err(kind)) => Err(io::Error::from(kind)),
                None => Err(io::Error::from(io::ErrorKind::ConnectionAborted)),
            }
        }
    }

    fn send_to(
        &self,
        buf: &[u8],
        target: SocketAddr,
    ) -> impl Future<Output = io::Result<usize>> + Send {
        let result = if self.fail_sends.load(Ordering::SeqCst) {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        } else {
            self.sent.lock().unwrap().push((buf.to_vec(), target));
            Ok(buf.len())
        };
        std::future::ready(result)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local)
    }
}
