use crate::error::{InstallError, ScanError, ScanFailure};
use crate::events::{ScannerEvent, SharedSink};
use crate::installer::{installer_for, InstallContext, DEFAULT_INSTALL_TIMEOUT_MINUTES};
use crate::model::{
    InstallationState, ScannerConfig, ScannerResult, INSTALLED_VERSION, UNKNOWN_VERSION,
};
use crate::process::{display_command, CommandRunner, Deadline, RunError};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Upper bound on `<tool> --version`.
pub const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared installation state machine and generic shell-out scan path.
///
/// Concrete scanners hold one of these and forward the [`Scanner`]
/// operations to it. The installation state goes from not installed to
/// installed once and is guarded by a per-instance lock, so concurrent
/// `setup`/`scan` calls on the same scanner are safe.
///
/// [`Scanner`]: super::Scanner
pub struct BaseScanner {
    config: ScannerConfig,
    state: Mutex<InstallationState>,
    setup_lock: Mutex<()>,
    ctx: InstallContext,
    install_timeout_minutes: u64,
    scan_timeout: Option<Duration>,
}

impl BaseScanner {
    pub fn new(config: ScannerConfig, ctx: InstallContext) -> Self {
        let state = if config.is_embedded() {
            InstallationState::embedded(config.version.as_str())
        } else {
            InstallationState::default()
        };

        Self {
            config,
            state: Mutex::new(state),
            setup_lock: Mutex::new(()),
            ctx,
            install_timeout_minutes: DEFAULT_INSTALL_TIMEOUT_MINUTES,
            scan_timeout: None,
        }
    }

    pub fn with_install_timeout(mut self, minutes: u64) -> Self {
        self.install_timeout_minutes = minutes;
        self
    }

    /// Kill scans that run longer than `timeout`. `None` waits forever.
    pub fn with_scan_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.scan_timeout = timeout;
        self
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn runner(&self) -> &Arc<dyn CommandRunner> {
        &self.ctx.runner
    }

    pub fn events(&self) -> &SharedSink {
        &self.ctx.events
    }

    pub async fn installation_state(&self) -> InstallationState {
        self.state.lock().await.clone()
    }

    /// Resolved executable, falling back to the configured path.
    pub async fn executable(&self) -> Option<PathBuf> {
        let state = self.state.lock().await;
        state
            .path
            .clone()
            .or_else(|| self.config.executable_path.clone())
    }

    /// Whether the tool is available, probing the configured path and then
    /// `PATH` on the first call that finds it.
    pub async fn is_installed(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.installed {
            return true;
        }

        let Some(path) = self.locate() else {
            return false;
        };
        self.ctx.events.emit(ScannerEvent::ProbeSucceeded {
            tool: self.config.name.clone(),
            path: path.clone(),
        });
        self.record_installed(&mut state, Some(path)).await;
        true
    }

    /// Marks the tool installed and probes its version.
    ///
    /// Version probing is best effort; the tool counts as installed even
    /// when `--version` fails.
    pub async fn register_installation_stats(&self) {
        let mut state = self.state.lock().await;
        let path = state.path.clone().or_else(|| self.locate());
        self.record_installed(&mut state, path).await;
    }

    fn locate(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config.executable_path {
            if self.ctx.runner.exists(path) {
                return Some(path.clone());
            }
        }
        self.ctx.runner.lookup(&self.config.name)
    }

    async fn record_installed(&self, state: &mut InstallationState, path: Option<PathBuf>) {
        state.installed = true;
        if path.is_some() {
            state.path = path;
        }

        let program = state
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| self.config.name.clone());
        state.version = self.probe_version(&program).await;

        self.ctx.events.emit(ScannerEvent::VersionDetected {
            tool: self.config.name.clone(),
            version: state.version.clone(),
        });
    }

    async fn probe_version(&self, program: &str) -> String {
        let deadline = Deadline::after(VERSION_PROBE_TIMEOUT);
        match self
            .ctx
            .runner
            .output(program, &["--version".to_string()], Some(deadline))
            .await
        {
            Ok(output) => match parse_version_output(&output.combined) {
                Some(version) => version,
                None if output.status.success() => first_line(&output.combined)
                    .unwrap_or_else(|| INSTALLED_VERSION.to_string()),
                None => UNKNOWN_VERSION.to_string(),
            },
            Err(err) => {
                self.ctx.events.emit(ScannerEvent::VersionProbeFailed {
                    tool: self.config.name.clone(),
                    error: err.to_string(),
                });
                UNKNOWN_VERSION.to_string()
            }
        }
    }

    /// Installs the tool with the strategy named by its installation type.
    ///
    /// # Errors
    ///
    /// [`InstallError::Setup`] naming the tool, wrapping either the
    /// installer's error or [`InstallError::NotVerified`] when the installer
    /// reports success but the tool still cannot be found.
    pub async fn setup(&self) -> Result<(), InstallError> {
        let _guard = self.setup_lock.lock().await;
        if self.is_installed().await {
            return Ok(());
        }

        self.install()
            .await
            .map_err(|err| InstallError::setup(&self.config.name, err))?;

        if !self.is_installed().await {
            return Err(InstallError::setup(
                &self.config.name,
                InstallError::NotVerified {
                    tool: self.config.name.clone(),
                },
            ));
        }
        Ok(())
    }

    async fn install(&self) -> Result<(), InstallError> {
        if let Some(dir) = self.config.install_dir() {
            match std::fs::create_dir_all(dir) {
                Ok(()) => {}
                // The archive writer escalates with sudo for protected paths.
                Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {}
                Err(e) => {
                    return Err(InstallError::io(
                        format!("failed to create directory {}", dir.display()),
                        e,
                    ))
                }
            }
        }

        let args = self.config.install_args()?;
        let installer = installer_for(
            self.config.installation_type,
            args,
            self.install_timeout_minutes,
            &self.ctx,
        )?;

        self.ctx.events.emit(ScannerEvent::InstallStarted {
            tool: self.config.name.clone(),
            installer: installer.kind(),
        });
        installer.install_tool().await
    }

    /// Runs the base command with `target` appended.
    ///
    /// Output lines go to `data` on success. On a non-zero exit the error
    /// and every output line go to `errors`.
    pub async fn scan(&self, target: &str) -> Result<ScannerResult, ScanFailure> {
        let tool = self.config.name.clone();
        if !self.is_installed().await {
            return Err(ScanFailure::bare(ScanError::NotInstalled { tool }));
        }

        let mut parts = self.config.command_parts();
        if parts.is_empty() {
            return Err(ScanFailure::bare(ScanError::EmptyCommand { tool }));
        }
        parts.push(target.to_string());
        let (program, args) = parts.split_at(1);
        let program = &program[0];

        self.ctx.events.emit(ScannerEvent::ScanStarted {
            tool: tool.clone(),
            target: target.to_string(),
        });
        self.ctx.events.emit(ScannerEvent::CommandStarted {
            tool: tool.clone(),
            command: display_command(program, args),
        });

        let deadline = self.scan_timeout.map(Deadline::after);
        let mut result = ScannerResult::new();

        let output = match self.ctx.runner.output(program, args, deadline).await {
            Ok(output) => output,
            Err(RunError::Spawn(source)) => {
                let error = ScanError::Spawn { tool, source };
                result.push_error(format!("scan error: {}", crate::error::error_chain(&error)));
                return Err(ScanFailure::new(result, error));
            }
            Err(RunError::TimedOut(after)) => {
                let error = ScanError::Timeout { tool, after };
                result.push_error(format!("scan error: {}", error));
                return Err(ScanFailure::new(result, error));
            }
        };

        if !output.status.success() {
            let error = ScanError::Failed {
                tool: tool.clone(),
                status: output.status.to_string(),
            };
            result.push_error(format!("scan error: {}", error));
            result.extend_error_lines(&output.combined);
            self.finished(&result);
            return Err(ScanFailure::new(result, error));
        }

        result.extend_data_lines(&output.combined);
        self.finished(&result);
        Ok(result)
    }

    fn finished(&self, result: &ScannerResult) {
        self.ctx.events.emit(ScannerEvent::ScanFinished {
            tool: self.config.name.clone(),
            data: result.data.len(),
            errors: result.errors.len(),
        });
    }
}

/// Picks the version out of `--version` output.
///
/// Prefers a `Key: value` line whose key mentions `Version` (returning the
/// value), then any line containing the word "version" in any case.
pub fn parse_version_output(output: &str) -> Option<String> {
    let lines = || output.lines().map(str::trim).filter(|l| !l.is_empty());

    lines()
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            let value = value.trim();
            (key.contains("Version") && !value.is_empty()).then(|| value.to_string())
        })
        .or_else(|| {
            lines()
                .find(|line| mentions_version(line))
                .map(str::to_string)
        })
}

fn mentions_version(line: &str) -> bool {
    line.split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| word.eq_ignore_ascii_case("version"))
}

fn first_line(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}
