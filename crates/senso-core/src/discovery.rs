//! Service discovery records.
//!
//! Each mode publishes a record while it is active so drivers can find the
//! device. Advertisement itself is delegated to the platform tools
//! (`avahi-publish-service`, `dns-sd`), run as tokio child processes so
//! that stopping them never blocks the mode runners.

use std::fmt;
use std::process::Stdio;
use std::sync::Mutex;

use tokio::process::{Child, Command};

use thiserror::Error;
use tracing::{info, warn};

use crate::state::DeviceMode;

/// Human readable service name.
pub const SERVICE_NAME: &str = "Mock Senso";

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Service discovery is not supported on this platform")]
    UnsupportedPlatform,
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: &'static str,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceProtocol {
    Tcp,
    Udp,
}

impl fmt::Display for ServiceProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceProtocol::Tcp => write!(f, "tcp"),
            ServiceProtocol::Udp => write!(f, "udp"),
        }
    }
}

/// An advertised service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: String,
    /// `sensoControl` or `sensoUpdate`.
    pub category: String,
    pub protocol: ServiceProtocol,
    pub port: u16,
    /// TXT record attributes.
    pub txt: Vec<(String, String)>,
}

impl ServiceDescriptor {
    /// Record of `mode` for the device with `serial`.
    pub fn for_mode(mode: DeviceMode, serial: &str, port: u16) -> Self {
        let (category, protocol) = match mode {
            DeviceMode::Application => ("sensoControl", ServiceProtocol::Tcp),
            DeviceMode::Bootloader => ("sensoUpdate", ServiceProtocol::Udp),
        };
        Self {
            name: SERVICE_NAME.to_string(),
            category: category.to_string(),
            protocol,
            port,
            txt: vec![
                ("ser_no".to_string(), serial.to_string()),
                ("mode".to_string(), mode.to_string()),
            ],
        }
    }

    /// e.g. `_sensoControl._tcp`
    pub fn service_type(&self) -> String {
        format!("_{}._{}", self.category, self.protocol)
    }

    pub fn txt_args(&self) -> Vec<String> {
        self.txt.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }
}

/// Publishes and withdraws the active mode's record.
pub trait Discovery: Send + Sync {
    fn publish(&self, service: &ServiceDescriptor) -> Result<(), DiscoveryError>;
    fn unpublish(&self);
}

/// Discards all records.
pub struct NullDiscovery;

impl Discovery for NullDiscovery {
    fn publish(&self, _service: &ServiceDescriptor) -> Result<(), DiscoveryError> {
        Ok(())
    }

    fn unpublish(&self) {}
}

/// Advertises through the platform's discovery helper process, which keeps
/// the record alive until it is killed.
///
/// Must be used from within a tokio runtime.
#[derive(Default)]
pub struct CommandDiscovery {
    child: Mutex<Option<(Child, String)>>,
}

impl CommandDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    fn command(service: &ServiceDescriptor) -> Result<(&'static str, Command), DiscoveryError> {
        let port = service.port.to_string();
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("dns-sd");
            cmd.arg("-R")
                .arg(&service.name)
                .arg(service.service_type())
                .arg("local")
                .arg(port)
                .args(service.txt_args());
            Ok(("dns-sd", cmd))
        } else if cfg!(target_os = "linux") {
            let mut cmd = Command::new("avahi-publish-service");
            cmd.arg(&service.name)
                .arg(service.service_type())
                .arg(port)
                .args(service.txt_args());
            Ok(("avahi-publish-service", cmd))
        } else {
            Err(DiscoveryError::UnsupportedPlatform)
        }
    }

    /// Start `cmd` as the helper for `service_type`, replacing any running one.
    fn start(
        &self,
        program: &'static str,
        mut cmd: Command,
        service_type: String,
    ) -> Result<(), DiscoveryError> {
        let child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DiscoveryError::Spawn { program, source })?;
        let previous = match self.child.lock() {
            Ok(mut slot) => slot.replace((child, service_type)),
            Err(_) => None,
        };
        if let Some((previous, _)) = previous {
            stop(previous);
        }
        Ok(())
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        self.child.lock().map(|c| c.is_some()).unwrap_or(false)
    }
}

/// Signals the helper without waiting; tokio reaps the exited process.
fn stop(mut child: Child) {
    if let Err(e) = child.start_kill() {
        warn!(error = %e, "Failed to stop discovery helper");
    }
}

impl Discovery for CommandDiscovery {
    fn publish(&self, service: &ServiceDescriptor) -> Result<(), DiscoveryError> {
        let (program, cmd) = Self::command(service)?;
        self.start(program, cmd, service.service_type())?;
        info!(
            name = %service.name,
            service_type = %service.service_type(),
            port = service.port,
            txt = ?service.txt,
            "Published discovery record"
        );
        Ok(())
    }

    fn unpublish(&self) {
        let Some((child, service_type)) = self.child.lock().ok().and_then(|mut c| c.take()) else {
            return;
        };
        stop(child);
        info!(service_type = %service_type, "Unpublished discovery record");
    }
}

impl Drop for CommandDiscovery {
    fn drop(&mut self) {
        self.unpublish();
    }
}

/// A publish or unpublish call seen by [`RecordingDiscovery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryCall {
    Publish(ServiceDescriptor),
    Unpublish,
}

/// Keeps every call, for tests and embedding.
#[derive(Default)]
pub struct RecordingDiscovery {
    calls: Mutex<Vec<DiscoveryCall>>,
}

impl RecordingDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<DiscoveryCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Discovery for RecordingDiscovery {
    fn publish(&self, service: &ServiceDescriptor) -> Result<(), DiscoveryError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(DiscoveryCall::Publish(service.clone()));
        }
        Ok(())
    }

    fn unpublish(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(DiscoveryCall::Unpublish);
        }
    }
}
