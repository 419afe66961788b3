//! Structured install/scan events.
//!
//! Library code never prints. Everything worth telling the operator goes
//! through an [`EventSink`]; [`TracingSink`] forwards to `tracing`, and
//! [`RecordingSink`] keeps events in memory for assertions.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Something that happened while provisioning or running a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannerEvent {
    ProbeSucceeded { tool: String, path: PathBuf },
    VersionDetected { tool: String, version: String },
    VersionProbeFailed { tool: String, error: String },
    InstallStarted { tool: String, installer: &'static str },
    InstallFinished { tool: String },
    CommandStarted { tool: String, command: String },
    Downloading { tool: String, url: String, version: String },
    Extracted { tool: String, dest: PathBuf },
    Escalating { path: PathBuf },
    Registered { tool: String },
    RegistrationFailed { tool: String, error: String },
    ScanStarted { tool: String, target: String },
    ScanFinished { tool: String, data: usize, errors: usize },
}

/// Receiver for [`ScannerEvent`]s.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ScannerEvent);
}

/// Shared handle to a sink.
pub type SharedSink = Arc<dyn EventSink>;

/// Default sink, logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: ScannerEvent) {
        match event {
            ScannerEvent::ProbeSucceeded { tool, path } => {
                tracing::debug!(%tool, path = %path.display(), "tool found");
            }
            ScannerEvent::VersionDetected { tool, version } => {
                tracing::info!(%tool, %version, "registered as installed");
            }
            ScannerEvent::VersionProbeFailed { tool, error } => {
                tracing::warn!(%tool, %error, "version probe failed");
            }
            ScannerEvent::InstallStarted { tool, installer } => {
                tracing::info!(%tool, installer, "installing");
            }
            ScannerEvent::InstallFinished { tool } => {
                tracing::info!(%tool, "installed successfully");
            }
            ScannerEvent::CommandStarted { tool, command } => {
                tracing::debug!(%tool, %command, "running");
            }
            ScannerEvent::Downloading { tool, url, version } => {
                tracing::info!(%tool, %url, %version, "downloading");
            }
            ScannerEvent::Extracted { tool, dest } => {
                tracing::debug!(%tool, dest = %dest.display(), "extracted executable");
            }
            ScannerEvent::Escalating { path } => {
                tracing::warn!(path = %path.display(), "permission denied, retrying with sudo");
            }
            ScannerEvent::Registered { tool } => {
                tracing::info!(%tool, "scanner registered");
            }
            ScannerEvent::RegistrationFailed { tool, error } => {
                tracing::error!(%tool, %error, "scanner registration failed");
            }
            ScannerEvent::ScanStarted { tool, target } => {
                tracing::info!(%tool, %target, "scan started");
            }
            ScannerEvent::ScanFinished { tool, data, errors } => {
                tracing::info!(%tool, data, errors, "scan finished");
            }
        }
    }
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ScannerEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ScannerEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count(&self, predicate: impl Fn(&ScannerEvent) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: ScannerEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

pub fn tracing_sink() -> SharedSink {
    Arc::new(TracingSink)
}
