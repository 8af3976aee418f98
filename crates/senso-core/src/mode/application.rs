//! Application mode: control protocol over TCP plus sensor data replay.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, instrument, warn};

use super::{ModeContext, shutdown_requested};
use crate::events::{DeviceEvent, DeviceObserver};
use crate::protocol::{ControlFrame, Responder, Response, is_sensor_frame};
use crate::replay::Replay;
use crate::state::{DeviceMode, Trigger};

/// One read is one request.
const READ_BUFFER_SIZE: usize = 4096;

/// How a control connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEnd {
    /// The driver closed the connection.
    Closed,
    /// `ENTER_DFU` was received; the connection was closed without a reply.
    EnterDfu,
    /// Reading or writing failed.
    Failed(String),
}

/// Serve one driver connection until it closes or requests DFU.
///
/// Requests are answered while the replay pushes sensor frames in between.
/// The replay is handed back so its position carries over to the next
/// connection.
pub async fn serve_connection<S, O>(
    stream: S,
    mut replay: Replay,
    responder: &Responder,
    observer: &O,
) -> (ConnectionEnd, Replay)
where
    S: AsyncRead + AsyncWrite + Unpin,
    O: DeviceObserver + ?Sized,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    let end = loop {
        tokio::select! {
            read = reader.read(&mut buf) => {
                let n = match read {
                    Ok(0) => break ConnectionEnd::Closed,
                    Ok(n) => n,
                    Err(e) => break ConnectionEnd::Failed(e.to_string()),
                };
                let frame = ControlFrame::parse(&buf[..n]);
                let commands = frame.commands();
                observer.on_event(&DeviceEvent::CommandReceived {
                    version: frame.version(),
                    commands: commands.clone(),
                });
                match responder.respond(&commands) {
                    Response::EnterDfu => break ConnectionEnd::EnterDfu,
                    Response::Nothing => debug!("Request without commands ignored"),
                    Response::Frame(response) => {
                        if let Err(e) = writer.write_all(&response.to_bytes()).await {
                            break ConnectionEnd::Failed(e.to_string());
                        }
                    }
                }
            }
            frame = replay.next_frame(), if !replay.is_finished() => {
                let Some(frame) = frame else {
                    debug!("Recording finished");
                    continue;
                };
                if !is_sensor_frame(&frame) {
                    continue;
                }
                if let Err(e) = writer.write_all(&frame).await {
                    break ConnectionEnd::Failed(e.to_string());
                }
            }
        }
    };

    (end, replay)
}

/// A finished connection task hands back the replay and the still-open stream.
type Served = (ConnectionEnd, Replay, TcpStream);

enum Event {
    Accepted(std::io::Result<(TcpStream, SocketAddr)>),
    ConnectionEnded(Result<Served, JoinError>),
    Shutdown,
}

/// Waits for the active connection task; pending forever when there is none.
async fn join_connection(
    connection: &mut Option<JoinHandle<Served>>,
) -> Result<Served, JoinError> {
    match connection {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Run Application mode until `ENTER_DFU`, listener failure or shutdown.
#[instrument(skip_all, fields(addr = %ctx.control_addr))]
pub async fn run<O>(ctx: &ModeContext<O>, shutdown: &mut watch::Receiver<bool>) -> Trigger
where
    O: DeviceObserver + 'static,
{
    let mode = DeviceMode::Application;
    let listener = match TcpListener::bind(ctx.control_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, "Could not bind control port");
            ctx.observer.on_event(&DeviceEvent::ListenerFailed {
                mode,
                error: e.to_string(),
            });
            return Trigger::ListenerFailed(e.to_string());
        }
    };
    let addr = listener.local_addr().unwrap_or(ctx.control_addr);
    ctx.publish(mode, addr.port());
    ctx.observer.on_event(&DeviceEvent::ModeStarted { mode, addr });

    let mut replay = Some(Replay::new(ctx.recording.clone(), ctx.replay));
    let mut connection: Option<JoinHandle<Served>> = None;
    // The connection that requested DFU stays open until discovery is withdrawn.
    let mut closing: Option<TcpStream> = None;

    let trigger = loop {
        let event = tokio::select! {
            accepted = listener.accept() => Event::Accepted(accepted),
            ended = join_connection(&mut connection) => Event::ConnectionEnded(ended),
            _ = shutdown_requested(shutdown) => Event::Shutdown,
        };

        match event {
            Event::Accepted(Ok((stream, peer))) => {
                if connection.is_some() {
                    ctx.observer.on_event(&DeviceEvent::ClientRejected { peer });
                    drop(stream);
                    continue;
                }
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(error = %e, "Failed to set TCP_NODELAY");
                }
                ctx.observer.on_event(&DeviceEvent::ClientConnected { peer });

                let replay = replay
                    .take()
                    .unwrap_or_else(|| Replay::new(ctx.recording.clone(), ctx.replay));
                let responder = ctx.responder.clone();
                let observer = ctx.observer.clone();
                connection = Some(tokio::spawn(async move {
                    let mut stream = stream;
                    let (end, replay) =
                        serve_connection(&mut stream, replay, &responder, observer.as_ref()).await;
                    let error = match &end {
                        ConnectionEnd::Failed(e) => Some(e.clone()),
                        _ => None,
                    };
                    observer.on_event(&DeviceEvent::ClientDisconnected { peer, error });
                    (end, replay, stream)
                }));
            }
            Event::Accepted(Err(e)) => {
                error!(error = %e, "Control listener failed");
                ctx.observer.on_event(&DeviceEvent::ListenerFailed {
                    mode,
                    error: e.to_string(),
                });
                break Trigger::ListenerFailed(e.to_string());
            }
            Event::ConnectionEnded(Ok((end, returned, stream))) => {
                connection = None;
                replay = Some(returned);
                if end == ConnectionEnd::EnterDfu {
                    closing = Some(stream);
                    break Trigger::EnterDfu;
                }
            }
            Event::ConnectionEnded(Err(e)) => {
                // Replay state went down with the task.
                warn!(error = %e, "Connection task aborted");
                connection = None;
            }
            Event::Shutdown => break Trigger::Shutdown,
        }
    };

    drop(replay);
    ctx.discovery.unpublish();
    drop(closing);
    if let Some(handle) = connection.take() {
        handle.abort();
        let _ = handle.await;
    }
    drop(listener);
    ctx.observer.on_event(&DeviceEvent::ModeStopped { mode });
    trigger
}
