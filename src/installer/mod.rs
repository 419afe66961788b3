//! Installer strategies.
//!
//! Each strategy makes one tool's executable available locally and is built
//! from a flat argument list plus a timeout in whole minutes:
//!
//! | Strategy | Arguments |
//! |----------|-----------|
//! | [`GithubInstaller`] | `url asset_pattern version dest_path` |
//! | [`ShellInstaller`] | package names, `-y`, `&&`-separated follow-up commands |
//! | [`PythonInstaller`] | `package [version] [extra_args...]` |
//!
//! [`installer_for`] picks the strategy from an [`InstallationType`].
//!
//! # Example
//!
//! ```no_run
//! use asmscan::installer::{installer_for, InstallContext};
//! use asmscan::model::InstallationType;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ctx = InstallContext::system();
//!     let args = vec!["whois".to_string(), "-y".to_string()];
//!     let installer = installer_for(InstallationType::Shell, args, 5, &ctx)?;
//!     installer.install_tool().await?;
//!     Ok(())
//! }
//! ```

pub mod archive;
mod github;
mod python;
mod shell;

pub use github::{select_asset, GithubAsset, GithubInstaller, GithubRelease, ResolvedAsset, DOWNLOAD_DEADLINE};
pub use python::PythonInstaller;
pub use shell::{ShellInstaller, PACKAGE_MANAGER_PREFIX};

use crate::error::InstallError;
use crate::events::{tracing_sink, SharedSink};
use crate::model::InstallationType;
use crate::process::{CommandRunner, SystemRunner};
use async_trait::async_trait;
use std::sync::Arc;

/// Default installer timeout used by every built-in tool.
pub const DEFAULT_INSTALL_TIMEOUT_MINUTES: u64 = 5;

/// A strategy that provisions one tool.
#[async_trait]
pub trait ToolInstaller: Send + Sync {
    /// Short strategy name used in events and errors.
    fn kind(&self) -> &'static str;

    /// Installs the tool, blocking the calling task until done.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails or the deadline expires; nothing
    /// is left looking installed in that case.
    async fn install_tool(&self) -> Result<(), InstallError>;
}

/// Collaborators shared by every installer.
#[derive(Clone)]
pub struct InstallContext {
    pub runner: Arc<dyn CommandRunner>,
    pub events: SharedSink,
    pub http: reqwest::Client,
}

impl InstallContext {
    pub fn new(runner: Arc<dyn CommandRunner>, events: SharedSink) -> Self {
        Self {
            runner,
            events,
            http: default_http_client(),
        }
    }

    /// Real processes, `tracing` events.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemRunner), tracing_sink())
    }

    pub fn with_http(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }
}

/// GitHub's API rejects requests without a user agent.
pub fn default_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

/// Nothing to install for in-process scanners.
#[derive(Debug, Default)]
pub struct NoopInstaller;

#[async_trait]
impl ToolInstaller for NoopInstaller {
    fn kind(&self) -> &'static str {
        "embedded"
    }

    async fn install_tool(&self) -> Result<(), InstallError> {
        Ok(())
    }
}

/// Builds the installer strategy for `kind`.
///
/// # Errors
///
/// Returns [`InstallError::NotImplemented`] for [`InstallationType::Internal`]
/// and [`InstallError::InvalidArguments`] when `args` don't fit the strategy.
pub fn installer_for(
    kind: InstallationType,
    args: Vec<String>,
    timeout_minutes: u64,
    ctx: &InstallContext,
) -> Result<Box<dyn ToolInstaller>, InstallError> {
    match kind {
        InstallationType::Github => Ok(Box::new(GithubInstaller::new(args, timeout_minutes, ctx)?)),
        InstallationType::Shell => Ok(Box::new(ShellInstaller::new(args, timeout_minutes, ctx)?)),
        InstallationType::Python => Ok(Box::new(PythonInstaller::new(args, timeout_minutes, ctx)?)),
        InstallationType::Embedded => Ok(Box::new(NoopInstaller)),
        InstallationType::Internal => Err(InstallError::NotImplemented(kind)),
    }
}

/// Like [`installer_for`], but from a textual type tag.
///
/// # Errors
///
/// Unknown tags are rejected with [`InstallError::Unsupported`].
pub fn installer_for_tag(
    tag: &str,
    args: Vec<String>,
    timeout_minutes: u64,
    ctx: &InstallContext,
) -> Result<Box<dyn ToolInstaller>, InstallError> {
    installer_for(tag.parse()?, args, timeout_minutes, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use crate::process::testing::ScriptedRunner;

    fn ctx() -> InstallContext {
        InstallContext::new(Arc::new(ScriptedRunner::new()), RecordingSink::new())
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_factory_selects_strategy() {
        let ctx = ctx();
        let github = installer_for(
            InstallationType::Github,
            args(&["https://example.com/tool.zip", "tool.*", "1.0.0", "/tmp/tool"]),
            5,
            &ctx,
        )
        .unwrap();
        assert_eq!(github.kind(), "github");

        let shell = installer_for(InstallationType::Shell, args(&["nmap", "-y"]), 5, &ctx).unwrap();
        assert_eq!(shell.kind(), "shell");

        let python = installer_for(InstallationType::Python, args(&["semgrep"]), 5, &ctx).unwrap();
        assert_eq!(python.kind(), "python");

        let embedded = installer_for(InstallationType::Embedded, Vec::new(), 5, &ctx).unwrap();
        assert_eq!(embedded.kind(), "embedded");
    }

    #[test]
    fn test_factory_rejects_internal() {
        let err = installer_for(InstallationType::Internal, Vec::new(), 5, &ctx())
            .err()
            .unwrap();
        assert!(matches!(err, InstallError::NotImplemented(InstallationType::Internal)));
        assert!(err.to_string().contains("not implemented"));
    }

    #[test]
    fn test_factory_rejects_unknown_tag() {
        let err = installer_for_tag("brew", args(&["jq"]), 5, &ctx()).err().unwrap();
        assert!(matches!(err, InstallError::Unsupported(ref tag) if tag == "brew"));
    }

    #[test]
    fn test_factory_validates_arguments() {
        let err = installer_for(InstallationType::Github, args(&["url"]), 5, &ctx())
            .err()
            .unwrap();
        assert!(matches!(err, InstallError::InvalidArguments { installer: "github", .. }));
    }

    #[tokio::test]
    async fn test_noop_installer_succeeds() {
        assert!(NoopInstaller.install_tool().await.is_ok());
    }
}
