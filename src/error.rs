//! Error types for installation and scanning.

use crate::model::{InstallationType, ScannerResult};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error raised while provisioning a tool.
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("unsupported installation type: {0}")]
    Unsupported(String),

    #[error("{0} installation type is not implemented yet")]
    NotImplemented(InstallationType),

    #[error("invalid {installer} installer arguments: {usage}")]
    InvalidArguments {
        installer: &'static str,
        usage: String,
    },

    #[error("HTTP request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("failed to parse release data from {url}")]
    ReleaseParse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid asset pattern {pattern}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("could not find matching release asset with pattern: {pattern}")]
    NoMatchingAsset { pattern: String },

    #[error("executable {tool} not found in archive {archive}")]
    ExecutableNotFound { tool: String, archive: String },

    #[error("unsupported archive format for {0}")]
    UnsupportedArchive(String),

    #[error("failed to read archive {archive}")]
    Archive {
        archive: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("privilege escalation failed while trying to {step}")]
    Escalation {
        step: String,
        #[source]
        source: std::io::Error,
    },

    #[error("privileged command `{command}` exited with {status}")]
    EscalationDenied { command: String, status: String },

    #[error("failed to start `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command `{command}` failed with {status}")]
    CommandFailed { command: String, status: String },

    #[error("{phase} timed out after {after:?}")]
    Timeout { phase: String, after: Duration },

    #[error("{0}")]
    RuntimeMissing(String),

    #[error("{0}")]
    UnsupportedRuntime(String),

    #[error("tool {tool} was not installed correctly")]
    NotVerified { tool: String },

    #[error("failed to set up {tool}")]
    Setup {
        tool: String,
        #[source]
        source: Box<InstallError>,
    },
}

impl InstallError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn setup(tool: impl Into<String>, source: InstallError) -> Self {
        Self::Setup {
            tool: tool.into(),
            source: Box::new(source),
        }
    }

    pub(crate) fn timeout(phase: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            phase: phase.into(),
            after,
        }
    }
}

/// Error raised by [`Scanner::scan`](crate::scanner::Scanner::scan).
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("scanner {tool} is not installed")]
    NotInstalled { tool: String },

    #[error("scanner {tool} has no command to run")]
    EmptyCommand { tool: String },

    #[error("failed to start {tool}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}")]
    Failed { tool: String, status: String },

    #[error("{tool} timed out after {after:?}")]
    Timeout { tool: String, after: Duration },

    #[error("failed to resolve {target}")]
    Resolve {
        target: String,
        #[source]
        source: std::io::Error,
    },
}

/// A failed scan together with whatever it produced before failing.
#[derive(Debug)]
pub struct ScanFailure {
    pub result: ScannerResult,
    pub error: ScanError,
}

impl ScanFailure {
    pub fn new(result: ScannerResult, error: ScanError) -> Self {
        Self { result, error }
    }

    /// Failure with an empty result.
    pub fn bare(error: ScanError) -> Self {
        Self::new(ScannerResult::default(), error)
    }
}

impl fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl std::error::Error for ScanFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.error)
    }
}

/// Renders an error with its whole `source()` chain, `a: b: c`.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
