//! Mode runners.
//!
//! Each runner binds its listener, serves until something ends the mode,
//! tears everything down and returns the [`Trigger`](crate::state::Trigger)
//! that ended it.

pub mod application;
pub mod bootloader;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;

use crate::discovery::{Discovery, ServiceDescriptor};
use crate::events::DeviceObserver;
use crate::protocol::Responder;
use crate::replay::{Recording, ReplayOptions};
use crate::state::DeviceMode;

/// Everything a mode needs, shared across activations.
pub struct ModeContext<O: DeviceObserver> {
    pub responder: Arc<Responder>,
    pub recording: Arc<Recording>,
    pub replay: ReplayOptions,
    pub control_addr: SocketAddr,
    pub update_addr: SocketAddr,
    pub observer: Arc<O>,
    pub discovery: Arc<dyn Discovery>,
}

impl<O: DeviceObserver> ModeContext<O> {
    /// Publish the discovery record of `mode`. Failures are logged only.
    pub(crate) fn publish(&self, mode: DeviceMode, port: u16) {
        let service = ServiceDescriptor::for_mode(mode, &self.responder.profile().serial, port);
        if let Err(e) = self.discovery.publish(&service) {
            warn!(mode = %mode, error = %e, "Discovery record not published");
        }
    }
}

/// Resolves once shutdown is requested or the sender is gone.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender counts as shutdown.
    let _ = shutdown.wait_for(|stop| *stop).await;
}
