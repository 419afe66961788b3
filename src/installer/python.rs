use super::{InstallContext, ToolInstaller};
use crate::error::InstallError;
use crate::events::{ScannerEvent, SharedSink};
use crate::process::{display_command, CommandRunner, Deadline, RunError};
use async_trait::async_trait;
use std::sync::Arc;

const PYTHON: &str = "python3";
const PIP_CANDIDATES: [&str; 2] = ["pip3", "pip"];

/// Installs a Python package with pip.
///
/// Arguments: `package [version] [extra_args...]`. A version of `latest` (or
/// an empty one) installs unpinned; anything else pins `package==version`.
pub struct PythonInstaller {
    package: String,
    version: String,
    pip_args: Vec<String>,
    timeout_minutes: u64,
    runner: Arc<dyn CommandRunner>,
    events: SharedSink,
}

impl PythonInstaller {
    pub fn new(args: Vec<String>, timeout_minutes: u64, ctx: &InstallContext) -> Result<Self, InstallError> {
        let mut args = args.into_iter();
        let Some(package) = args.next().filter(|p| !p.is_empty()) else {
            return Err(InstallError::InvalidArguments {
                installer: "python",
                usage: "python <package_name> [version] [extra_args...]".to_string(),
            });
        };

        let version = args
            .next()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "latest".to_string());

        let mut pip_args = vec!["install".to_string()];
        if version == "latest" {
            pip_args.push(package.clone());
        } else {
            pip_args.push(format!("{}=={}", package, version));
        }
        pip_args.extend(args);

        Ok(Self {
            package,
            version,
            pip_args,
            timeout_minutes,
            runner: ctx.runner.clone(),
            events: ctx.events.clone(),
        })
    }

    /// Arguments passed to pip.
    pub fn pip_args(&self) -> &[String] {
        &self.pip_args
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    fn find_pip(&self) -> Option<String> {
        PIP_CANDIDATES
            .iter()
            .find_map(|name| self.runner.lookup(name))
            .map(|path| path.display().to_string())
    }

    async fn check_runtime(&self, deadline: Deadline) -> Result<(), InstallError> {
        let output = self
            .runner
            .output(PYTHON, &["--version".to_string()], Some(deadline))
            .await
            .map_err(|err| map_run_error(err, format!("{} --version", PYTHON)))?;

        if !output.status.success() {
            return Err(InstallError::CommandFailed {
                command: format!("{} --version", PYTHON),
                status: output.status.to_string(),
            });
        }

        match python_major_version(&output.combined) {
            Some(2) => Err(InstallError::UnsupportedRuntime(
                "python 2 is not supported, please install Python 3".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Major version from `Python 3.11.4`-style output.
fn python_major_version(output: &str) -> Option<u64> {
    output
        .split_whitespace()
        .skip_while(|token| !token.eq_ignore_ascii_case("python"))
        .nth(1)
        .and_then(|version| version.split('.').next())
        .and_then(|major| major.parse().ok())
}

fn map_run_error(err: RunError, command: String) -> InstallError {
    match err {
        RunError::Spawn(source) => InstallError::Spawn { command, source },
        RunError::TimedOut(after) => InstallError::timeout(format!("`{}`", command), after),
    }
}

#[async_trait]
impl ToolInstaller for PythonInstaller {
    fn kind(&self) -> &'static str {
        "python"
    }

    async fn install_tool(&self) -> Result<(), InstallError> {
        let deadline = Deadline::after_minutes(self.timeout_minutes);

        if self.runner.lookup(PYTHON).is_none() {
            return Err(InstallError::RuntimeMissing(
                "python3 and pip installation not found, please install them".to_string(),
            ));
        }
        let pip = self.find_pip().ok_or_else(|| {
            InstallError::RuntimeMissing("pip installation not found, please install it".to_string())
        })?;

        self.check_runtime(deadline).await?;

        let command = display_command(&pip, &self.pip_args);
        self.events.emit(ScannerEvent::CommandStarted {
            tool: self.package.clone(),
            command: command.clone(),
        });

        let status = self
            .runner
            .run_inherited(&pip, &self.pip_args, Some(deadline))
            .await
            .map_err(|err| map_run_error(err, command.clone()))?;

        if !status.success() {
            return Err(InstallError::CommandFailed {
                command,
                status: status.to_string(),
            });
        }

        // Entry points may only be reachable through `python -m`; a missing
        // PATH entry is not a failure.
        if let Some(path) = self.runner.lookup(&self.package) {
            self.events.emit(ScannerEvent::ProbeSucceeded {
                tool: self.package.clone(),
                path,
            });
        }

        self.events.emit(ScannerEvent::InstallFinished {
            tool: self.package.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use crate::process::testing::ScriptedRunner;
    use crate::process::CommandOutput;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn python_runner(version_output: &'static str, pip_code: i32) -> ScriptedRunner {
        ScriptedRunner::responding(move |program, _| {
            if program == PYTHON {
                Ok(CommandOutput::success(version_output))
            } else if pip_code == 0 {
                Ok(CommandOutput::success(""))
            } else {
                Ok(CommandOutput::failure(pip_code, ""))
            }
        })
        .with_path_entry("python3", "/usr/bin/python3")
        .with_path_entry("pip3", "/usr/bin/pip3")
    }

    fn installer(runner: Arc<ScriptedRunner>, list: &[&str]) -> PythonInstaller {
        let ctx = InstallContext::new(runner, RecordingSink::new());
        PythonInstaller::new(args(list), 5, &ctx).unwrap()
    }

    #[test]
    fn test_pip_args_pinned_and_latest() {
        let runner = Arc::new(ScriptedRunner::new());
        let pinned = installer(runner.clone(), &["sqlmap", "1.8.2"]);
        assert_eq!(pinned.pip_args(), &args(&["install", "sqlmap==1.8.2"])[..]);

        let latest = installer(runner.clone(), &["semgrep", "latest", "--user"]);
        assert_eq!(latest.pip_args(), &args(&["install", "semgrep", "--user"])[..]);

        let defaulted = installer(runner, &["aiodnsbrute"]);
        assert_eq!(defaulted.version(), "latest");
    }

    #[test]
    fn test_python_major_version() {
        assert_eq!(python_major_version("Python 3.11.4\n"), Some(3));
        assert_eq!(python_major_version("Python 2.7.18"), Some(2));
        assert_eq!(python_major_version("garbage"), None);
    }

    #[tokio::test]
    async fn test_installs_with_pip() {
        let runner = Arc::new(python_runner("Python 3.12.1", 0));
        installer(runner.clone(), &["semgrep", "latest"])
            .install_tool()
            .await
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], args(&["/usr/bin/pip3", "install", "semgrep"]));
    }

    #[tokio::test]
    async fn test_missing_path_entry_is_not_fatal() {
        let runner = Arc::new(python_runner("Python 3.12.1", 0));
        let result = installer(runner, &["aiodnsbrute"]).install_tool().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_refuses_python2() {
        let runner = Arc::new(python_runner("Python 2.7.18", 0));
        let err = installer(runner.clone(), &["sqlmap"])
            .install_tool()
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::UnsupportedRuntime(_)));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_pip_failure_is_hard_error() {
        let runner = Arc::new(python_runner("Python 3.10.0", 1));
        let err = installer(runner, &["sqlmap", "latest"])
            .install_tool()
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_missing_runtime() {
        let runner = Arc::new(ScriptedRunner::new());
        let err = installer(runner.clone(), &["semgrep"])
            .install_tool()
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::RuntimeMissing(_)));
        assert!(runner.calls().is_empty());
    }
}
