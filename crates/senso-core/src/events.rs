//! Event system for observability.
//!
//! The device reports what it does through `DeviceObserver`, so the CLI
//! can log it and tests can watch it without parsing log output.

use std::net::SocketAddr;

use crate::protocol::Command;
use crate::protocol::command::describe;
use crate::state::{DeviceMode, Trigger};
use crate::transfer::TransferOutcome;

/// Events emitted by the simulated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A mode's listener is bound and its discovery record published.
    ModeStarted { mode: DeviceMode, addr: SocketAddr },
    /// A mode finished its teardown.
    ModeStopped { mode: DeviceMode },
    /// A mode could not bind or lost its listener.
    ListenerFailed { mode: DeviceMode, error: String },
    /// Moving to another mode after the settle delay.
    Transition {
        from: DeviceMode,
        to: DeviceMode,
        trigger: Trigger,
    },
    /// Driver connected to the control port.
    ClientConnected { peer: SocketAddr },
    /// A second connection was refused while one is active.
    ClientRejected { peer: SocketAddr },
    /// Control connection ended.
    ClientDisconnected {
        peer: SocketAddr,
        error: Option<String>,
    },
    /// A control frame was decoded.
    CommandReceived { version: u8, commands: Vec<Command> },
    /// Write request received; a new transfer begins.
    TransferStarted { peer: SocketAddr },
    /// A data block was accepted and acknowledged.
    BlockReceived { block: u16, bytes_received: u64 },
    /// The transfer session ended.
    TransferFinished { outcome: TransferOutcome },
}

/// Observer trait for receiving device events.
///
/// Implement this trait to receive updates.
pub trait DeviceObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &DeviceEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl DeviceObserver for NullObserver {
    fn on_event(&self, _event: &DeviceEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl DeviceObserver for TracingObserver {
    fn on_event(&self, event: &DeviceEvent) {
        match event {
            DeviceEvent::ModeStarted { mode, addr } => {
                tracing::info!(mode = %mode, addr = %addr, "Mode started");
            }
            DeviceEvent::ModeStopped { mode } => {
                tracing::info!(mode = %mode, "Mode stopped");
            }
            DeviceEvent::ListenerFailed { mode, error } => {
                tracing::error!(mode = %mode, "Listener failed: {}", error);
            }
            DeviceEvent::Transition { from, to, trigger } => {
                tracing::info!(from = %from, to = %to, trigger = %trigger, "Switching mode");
            }
            DeviceEvent::ClientConnected { peer } => {
                tracing::info!(peer = %peer, "Driver connected");
            }
            DeviceEvent::ClientRejected { peer } => {
                tracing::warn!(peer = %peer, "Connection refused, driver already connected");
            }
            DeviceEvent::ClientDisconnected { peer, error } => match error {
                Some(e) => tracing::warn!(peer = %peer, "Driver disconnected with error: {}", e),
                None => tracing::info!(peer = %peer, "Driver disconnected"),
            },
            DeviceEvent::CommandReceived { version, commands } => {
                tracing::info!(
                    version = version,
                    types = %describe(commands),
                    "Received command"
                );
            }
            DeviceEvent::TransferStarted { peer } => {
                tracing::info!(peer = %peer, "Write request received");
            }
            DeviceEvent::BlockReceived {
                block,
                bytes_received,
            } => {
                tracing::debug!(block = block, total = bytes_received, "Block received");
            }
            DeviceEvent::TransferFinished { outcome } => match outcome {
                TransferOutcome::Completed { bytes_received } => {
                    tracing::info!(total = bytes_received, "Firmware received");
                }
                other => tracing::warn!(outcome = %other, "Firmware transfer ended"),
            },
        }
    }
}

/// Observer that keeps every event, for tests and embedding.
#[derive(Default)]
pub struct RecordingObserver {
    events: std::sync::Mutex<Vec<DeviceEvent>>,
    notify: tokio::sync::Notify,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Waits until an event matching `pred` has been recorded and returns it.
    pub async fn wait_for<F>(&self, mut pred: F) -> DeviceEvent
    where
        F: FnMut(&DeviceEvent) -> bool,
    {
        loop {
            let notified = self.notify.notified();
            if let Some(event) = self.events().into_iter().find(|e| pred(e)) {
                return event;
            }
            notified.await;
        }
    }

    /// Waits until the recorded history satisfies `pred` and returns it.
    pub async fn wait_until<F>(&self, mut pred: F) -> Vec<DeviceEvent>
    where
        F: FnMut(&[DeviceEvent]) -> bool,
    {
        loop {
            let notified = self.notify.notified();
            let events = self.events();
            if pred(&events) {
                return events;
            }
            notified.await;
        }
    }
}

impl DeviceObserver for RecordingObserver {
    fn on_event(&self, event: &DeviceEvent) {
        TracingObserver.on_event(event);
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        self.notify.notify_waiters();
    }
}
