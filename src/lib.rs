//! Pluggable attack-surface scanner orchestrator.
//!
//! Every security tool sits behind the [`Scanner`] trait. A scanner knows how
//! to install its tool (GitHub release, apt, pip), probe whether it is
//! present, and run it against a target, returning output lines split into
//! data and errors. [`ScannerRegistry`] collects scanners by name.

pub mod config;
pub mod error;
pub mod events;
pub mod installer;
pub mod model;
pub mod output;
pub mod platform;
pub mod process;
pub mod registry;
pub mod scanner;
pub mod target;

pub use config::Config;
pub use error::{InstallError, ScanError, ScanFailure};
pub use model::{InstallationState, InstallationType, ScannerConfig, ScannerResult, ToolVersion};
pub use registry::{RegistrationPolicy, ScannerRegistry};
pub use scanner::Scanner;
