//! Senso device - top-level orchestrator alternating between modes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{debug, info, instrument};

use crate::config::DeviceConfig;
use crate::discovery::{CommandDiscovery, Discovery, NullDiscovery};
use crate::events::{DeviceEvent, DeviceObserver, TracingObserver};
use crate::mode::{self, ModeContext, shutdown_requested};
use crate::profile::{BOARD_NAMES, DeviceProfile};
use crate::protocol::Responder;
use crate::replay::Recording;
use crate::state::{DeviceMode, DeviceState, Transition, Trigger};
use crate::status::StatusReport;

/// A simulated Senso device.
pub struct SensoDevice<O: DeviceObserver> {
    ctx: ModeContext<O>,
    initial: DeviceMode,
    settle_delay: Duration,
}

impl SensoDevice<TracingObserver> {
    /// Create a device that logs through tracing and advertises itself
    /// unless disabled in `config`.
    pub fn new(config: &DeviceConfig) -> Result<Self> {
        let discovery: Arc<dyn Discovery> = if config.advertise {
            Arc::new(CommandDiscovery::new())
        } else {
            Arc::new(NullDiscovery)
        };
        Self::with_parts(config, Arc::new(TracingObserver), discovery)
    }
}

impl<O: DeviceObserver + 'static> SensoDevice<O> {
    /// Create a device with a custom observer and discovery backend.
    pub fn with_parts(
        config: &DeviceConfig,
        observer: Arc<O>,
        discovery: Arc<dyn Discovery>,
    ) -> Result<Self> {
        config.validate().context("Invalid device configuration")?;
        let firmware = config.firmware()?;

        let recording = match &config.recording {
            Some(path) => Recording::load(path)
                .with_context(|| format!("Failed to load recording {}", path.display()))?,
            None => {
                info!("No recording configured, sensor data disabled");
                Recording::default()
            }
        };

        let profile = DeviceProfile::with_firmware(firmware);
        info!(serial = %profile.serial, firmware = %profile.firmware, "Device profile");
        for (board, serial) in BOARD_NAMES.iter().zip(&profile.board_serials) {
            debug!(board = board, serial = %serial, "Board");
        }
        let responder = Responder::new(profile, StatusReport::default());
        Ok(Self {
            ctx: ModeContext {
                responder: Arc::new(responder),
                recording: Arc::new(recording),
                replay: config.replay_options(),
                control_addr: config.control_addr(),
                update_addr: config.update_addr(),
                observer,
                discovery,
            },
            initial: config.initial_mode(),
            settle_delay: config.settle_delay(),
        })
    }

    pub fn profile(&self) -> &DeviceProfile {
        self.ctx.responder.profile()
    }

    /// Run modes until `shutdown` is set (or its sender dropped).
    ///
    /// Returns the final state.
    #[instrument(skip_all, fields(serial = %self.profile().serial))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> DeviceState {
        let mut state = DeviceState::new(self.initial);
        info!(mode = %state.mode(), "Device starting");

        loop {
            let current = state.mode();
            let trigger = match current {
                DeviceMode::Application => mode::application::run(&self.ctx, &mut shutdown).await,
                DeviceMode::Bootloader => mode::bootloader::run(&self.ctx, &mut shutdown).await,
            };
            // Whatever ended the mode, a pending shutdown wins.
            let trigger = if shutdown_pending(&shutdown) {
                Trigger::Shutdown
            } else {
                trigger
            };

            match state.apply(&trigger) {
                Transition::Halt => break,
                Transition::Stay => {}
                Transition::Switch(next) => {
                    self.ctx.observer.on_event(&DeviceEvent::Transition {
                        from: current,
                        to: next,
                        trigger,
                    });
                    if !self.settle(&mut shutdown).await {
                        info!("Shutdown during settle delay");
                        break;
                    }
                }
            }
        }

        info!(mode = %state.mode(), transitions = state.transitions(), "Device stopped");
        state
    }

    /// Sleeps for the settle delay. False if shutdown came first.
    async fn settle(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.settle_delay) => true,
            _ = shutdown_requested(shutdown) => false,
        }
    }
}

fn shutdown_pending(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}
