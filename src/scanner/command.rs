use super::{BaseScanner, Scanner};
use crate::error::{InstallError, ScanFailure};
use crate::installer::InstallContext;
use crate::model::{InstallationState, ScannerConfig, ScannerResult};
use async_trait::async_trait;
use std::time::Duration;

/// Rewrites the user-supplied target before it is appended to the command.
pub type TargetNormalizer = fn(&str) -> String;

/// Scanner for any tool driven as `<base command> <target>`.
///
/// All built-in external tools use this; the per-tool differences live in
/// the [`ScannerConfig`] and an optional target normalizer (subfinder wants a
/// bare domain, nuclei a URL).
pub struct CommandScanner {
    base: BaseScanner,
    normalize: Option<TargetNormalizer>,
}

impl CommandScanner {
    pub fn new(config: ScannerConfig, ctx: InstallContext) -> Self {
        Self {
            base: BaseScanner::new(config, ctx),
            normalize: None,
        }
    }

    pub fn with_normalizer(mut self, normalize: TargetNormalizer) -> Self {
        self.normalize = Some(normalize);
        self
    }

    pub fn with_install_timeout(mut self, minutes: u64) -> Self {
        self.base = self.base.with_install_timeout(minutes);
        self
    }

    pub fn with_scan_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.base = self.base.with_scan_timeout(timeout);
        self
    }

    pub fn base(&self) -> &BaseScanner {
        &self.base
    }
}

#[async_trait]
impl Scanner for CommandScanner {
    fn config(&self) -> &ScannerConfig {
        self.base.config()
    }

    async fn setup(&self) -> Result<(), InstallError> {
        self.base.setup().await
    }

    async fn is_installed(&self) -> bool {
        self.base.is_installed().await
    }

    async fn installation_state(&self) -> InstallationState {
        self.base.installation_state().await
    }

    async fn scan(&self, target: &str) -> Result<ScannerResult, ScanFailure> {
        match self.normalize {
            Some(normalize) => self.base.scan(&normalize(target)).await,
            None => self.base.scan(target).await,
        }
    }
}
