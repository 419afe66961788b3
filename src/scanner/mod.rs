//! Scanners.
//!
//! This module provides the [`Scanner`] trait, the shared installation state
//! machine [`BaseScanner`], and the built-in scanners.
//!
//! # Available Scanners
//!
//! | Scanner | Tool | Installed via |
//! |---------|------|---------------|
//! | [`CommandScanner`] | nmap, whois, masscan, wpscan | apt (`shell`) |
//! | [`CommandScanner`] | nuclei, subfinder, trufflehog | GitHub release (`github`) |
//! | [`CommandScanner`] | sqlmap, semgrep, aiodnsbrute | pip (`python`) |
//! | [`DnsScanner`] | dns | in-process (`embedded`) |
//!
//! # Example
//!
//! ```no_run
//! use asmscan::config::Config;
//! use asmscan::installer::InstallContext;
//! use asmscan::scanner::{get_scanner, Scanner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let scanner = get_scanner("nmap", &config, &InstallContext::system())
//!         .expect("nmap is a known tool");
//!
//!     scanner.setup().await?;
//!     let result = scanner.scan("scanme.nmap.org").await?;
//!     for line in &result.data {
//!         println!("{}", line);
//!     }
//!     Ok(())
//! }
//! ```

mod base;
mod catalog;
mod command;
mod dns;

pub use base::{parse_version_output, BaseScanner, VERSION_PROBE_TIMEOUT};
pub use catalog::{all_scanners, get_scanner, known_tools, BUILTIN_TOOLS};
pub use command::CommandScanner;
pub use dns::DnsScanner;

use crate::error::{InstallError, ScanFailure};
use crate::model::{InstallationState, ScannerConfig, ScannerResult};
use async_trait::async_trait;

/// One security tool behind a uniform install/scan contract.
///
/// Implementors usually compose a [`BaseScanner`] and forward to it,
/// overriding [`scan`](Self::scan) when the tool needs extra flags or
/// structured output parsing.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// The tool's declarative descriptor.
    fn config(&self) -> &ScannerConfig;

    /// Registry key for this scanner.
    fn name(&self) -> &str {
        &self.config().name
    }

    /// Makes sure the backing tool is present, installing it if needed.
    ///
    /// A no-op once the tool is installed.
    ///
    /// # Errors
    ///
    /// Returns an error naming the tool if installation fails or the tool
    /// still cannot be found afterwards.
    async fn setup(&self) -> Result<(), InstallError>;

    /// Whether the tool is available. May probe and cache, never installs.
    async fn is_installed(&self) -> bool;

    /// Snapshot of what is known about the installed tool.
    async fn installation_state(&self) -> InstallationState;

    /// Runs the tool against `target`.
    ///
    /// # Errors
    ///
    /// Fails without spawning anything when the tool is not installed. On
    /// execution failure the returned [`ScanFailure`] carries every line
    /// produced so far.
    async fn scan(&self, target: &str) -> Result<ScannerResult, ScanFailure>;
}
