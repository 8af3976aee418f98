//! Bootloader mode: one firmware transfer session over UDP.

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{error, info, instrument};

use super::{ModeContext, shutdown_requested};
use crate::events::{DeviceEvent, DeviceObserver};
use crate::state::{DeviceMode, Trigger};
use crate::transfer::{TransferOutcome, receive_firmware};

/// Run Bootloader mode until the transfer session ends or shutdown.
///
/// Every ending, including cancellation, is reported as
/// [`Trigger::TransferEnded`].
#[instrument(skip_all, fields(addr = %ctx.update_addr))]
pub async fn run<O>(ctx: &ModeContext<O>, shutdown: &mut watch::Receiver<bool>) -> Trigger
where
    O: DeviceObserver,
{
    let mode = DeviceMode::Bootloader;
    let socket = match UdpSocket::bind(ctx.update_addr).await {
        Ok(socket) => socket,
        Err(e) => {
            error!(error = %e, "Could not bind update port");
            ctx.observer.on_event(&DeviceEvent::ListenerFailed {
                mode,
                error: e.to_string(),
            });
            return Trigger::ListenerFailed(e.to_string());
        }
    };
    let addr = socket.local_addr().unwrap_or(ctx.update_addr);
    ctx.publish(mode, addr.port());
    ctx.observer.on_event(&DeviceEvent::ModeStarted { mode, addr });

    let outcome = tokio::select! {
        result = receive_firmware(&socket, ctx.observer.as_ref()) => match result {
            Ok(summary) => {
                info!(
                    peer = %summary.peer,
                    blocks = summary.last_block,
                    bytes = summary.bytes_received,
                    "Firmware transfer complete"
                );
                TransferOutcome::Completed {
                    bytes_received: summary.bytes_received,
                }
            }
            Err(e) => {
                error!(error = %e, "Firmware transfer failed");
                TransferOutcome::Failed(e.to_string())
            }
        },
        _ = shutdown_requested(shutdown) => TransferOutcome::Cancelled,
    };

    drop(socket);
    ctx.discovery.unpublish();
    ctx.observer.on_event(&DeviceEvent::TransferFinished {
        outcome: outcome.clone(),
    });
    ctx.observer.on_event(&DeviceEvent::ModeStopped { mode });
    Trigger::TransferEnded(outcome)
}
