//! Core data types for scanner descriptors, installation state and results.
//!
//! This module contains the fundamental types used throughout asmscan:
//!
//! - [`ScannerConfig`] - Declarative descriptor of one external tool
//! - [`InstallationType`] - Which installer strategy provisions the tool
//! - [`ToolVersion`] - Requested tool version
//! - [`InstallationState`] - What is known about the installed tool
//! - [`ScannerResult`] - Output of one scan
//!
//! # Example
//!
//! ```
//! use asmscan::model::{InstallationType, ScannerConfig};
//!
//! let config = ScannerConfig::new("nmap")
//!     .executable_path("/usr/bin/nmap")
//!     .base_command("nmap -sV -T4")
//!     .installation(InstallationType::Shell);
//!
//! assert_eq!(config.command_parts(), vec!["nmap", "-sV", "-T4"]);
//! ```

mod result;
mod tool;

pub use result::*;
pub use tool::*;
