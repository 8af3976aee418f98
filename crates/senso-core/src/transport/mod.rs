//! Transport layer module.

pub mod mock;
pub mod traits;
pub mod udp;

pub use mock::MockDatagram;
pub use traits::DatagramSocket;
