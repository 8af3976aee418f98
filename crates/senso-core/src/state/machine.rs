//! Two-mode device state machine.
//!
//! The transition table is explicit: whichever component detects a trigger
//! (command decode, transfer end, listener failure) hands it to
//! [`DeviceState::apply`], which decides the next mode.

use std::fmt;

use crate::transfer::TransferOutcome;

/// Operating mode of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceMode {
    /// Control protocol over TCP plus sensor data replay.
    Application,
    /// Firmware transfer over UDP (DFU).
    Bootloader,
}

impl Default for DeviceMode {
    fn default() -> Self {
        Self::Application
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceMode::Application => write!(f, "Application"),
            DeviceMode::Bootloader => write!(f, "Bootloader"),
        }
    }
}

impl DeviceMode {
    pub fn other(self) -> Self {
        match self {
            DeviceMode::Application => DeviceMode::Bootloader,
            DeviceMode::Bootloader => DeviceMode::Application,
        }
    }
}

/// Why the active mode ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// `ENTER_DFU` received on the control connection.
    EnterDfu,
    /// The firmware transfer session ended, for any reason.
    TransferEnded(TransferOutcome),
    /// The mode's listener could not be bound or stopped accepting.
    ListenerFailed(String),
    /// Process shutdown requested.
    Shutdown,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::EnterDfu => write!(f, "ENTER_DFU"),
            Trigger::TransferEnded(outcome) => write!(f, "transfer ended ({outcome})"),
            Trigger::ListenerFailed(e) => write!(f, "listener failed ({e})"),
            Trigger::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Result of applying a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Settle, then start this mode.
    Switch(DeviceMode),
    /// Trigger does not apply to the current mode; restart it.
    Stay,
    /// Stop the device.
    Halt,
}

impl DeviceMode {
    /// Transition table.
    pub fn on(self, trigger: &Trigger) -> Transition {
        match (self, trigger) {
            (_, Trigger::Shutdown) => Transition::Halt,
            (DeviceMode::Application, Trigger::EnterDfu) => Transition::Switch(DeviceMode::Bootloader),
            (DeviceMode::Bootloader, Trigger::TransferEnded(_)) => {
                Transition::Switch(DeviceMode::Application)
            }
            // A port conflict must not hang the device: try the other mode.
            (mode, Trigger::ListenerFailed(_)) => Transition::Switch(mode.other()),
            (DeviceMode::Application, Trigger::TransferEnded(_))
            | (DeviceMode::Bootloader, Trigger::EnterDfu) => Transition::Stay,
        }
    }
}

/// Current mode plus transition bookkeeping.
#[derive(Debug, Default)]
pub struct DeviceState {
    mode: DeviceMode,
    transitions: u32,
}

impl DeviceState {
    pub fn new(initial: DeviceMode) -> Self {
        Self {
            mode: initial,
            transitions: 0,
        }
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    pub fn transitions(&self) -> u32 {
        self.transitions
    }

    /// Apply a trigger and move to the next mode if it switches.
    pub fn apply(&mut self, trigger: &Trigger) -> Transition {
        let transition = self.mode.on(trigger);
        match transition {
            Transition::Switch(next) => {
                tracing::info!(from = %self.mode, to = %next, trigger = %trigger, "State transition");
                self.mode = next;
                self.transitions += 1;
            }
            Transition::Stay => {
                tracing::warn!(mode = %self.mode, trigger = %trigger, "Trigger ignored in current mode");
            }
            Transition::Halt => {
                tracing::info!(mode = %self.mode, "Halting");
            }
        }
        transition
    }
}
