//! Senso-Core: a simulated networked Senso sensor device.
//!
//! The device lets driver software be developed and tested without
//! hardware. It answers the binary control protocol, streams recorded
//! sensor frames and accepts firmware uploads.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Control frame codec, command set, response builder
//! - **Status / Profile**: Board status records and device identity
//! - **Replay**: Timed playback of recorded sensor frames
//! - **Transfer**: Block-acknowledged firmware upload over datagrams
//! - **Transport**: Datagram socket abstraction (tokio UDP, mock)
//! - **State**: Application/Bootloader state machine
//! - **Mode**: Per-mode listeners and teardown
//! - **Discovery**: Service records of the active mode
//! - **Events**: Observer pattern for logging and tests
//! - **Device**: High-level orchestrator
//!
//! # Example
//!
//! ```no_run
//! use senso_core::{DeviceConfig, SensoDevice};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let device = SensoDevice::new(&DeviceConfig::default())?;
//! let (stop, shutdown) = tokio::sync::watch::channel(false);
//! let handle = tokio::spawn(async move { device.run(shutdown).await });
//! // ...
//! stop.send_replace(true);
//! handle.await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod device;
pub mod discovery;
pub mod events;
pub mod mode;
pub mod profile;
pub mod protocol;
pub mod replay;
pub mod state;
pub mod status;
pub mod transfer;
pub mod transport;

// Re-exports for convenience
pub use config::{ConfigError, DeviceConfig};
pub use device::SensoDevice;
pub use discovery::{
    CommandDiscovery, Discovery, DiscoveryError, NullDiscovery, RecordingDiscovery,
    ServiceDescriptor,
};
pub use events::{DeviceEvent, DeviceObserver, NullObserver, RecordingObserver, TracingObserver};
pub use profile::{DeviceProfile, FirmwareVersion};
pub use protocol::{Command, ControlFrame, Responder, Response};
pub use replay::{Recording, Replay, ReplayError, ReplayOptions};
pub use state::{DeviceMode, DeviceState, Transition, Trigger};
pub use status::{BoardStatus, StatusReport};
pub use transfer::{TransferError, TransferOutcome};
pub use transport::{DatagramSocket, MockDatagram};
