//! Subprocess execution and PATH lookup.
//!
//! Everything that spawns a program or asks the filesystem whether a tool
//! exists goes through [`CommandRunner`], so scanners and installers can be
//! driven by a scripted runner in tests.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::Instant;

/// Budgets too large to add to the clock are clamped to this horizon.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Absolute point in time after which a running command is killed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        let now = Instant::now();
        Self {
            at: now
                .checked_add(budget)
                .unwrap_or_else(|| now + FAR_FUTURE),
            budget,
        }
    }

    /// Installer timeouts are configured in whole minutes.
    pub fn after_minutes(minutes: u64) -> Self {
        Self::after(minutes_to_duration(minutes))
    }

    pub fn at(&self) -> Instant {
        self.at
    }

    /// The duration this deadline was created with.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Whichever of the two deadlines fires first.
    pub fn earliest(self, other: Deadline) -> Deadline {
        if other.at < self.at {
            other
        } else {
            self
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }
}

/// Converts a minute count from configuration, saturating instead of
/// overflowing.
pub fn minutes_to_duration(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60))
}

/// Exit status of a finished command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
}

impl CommandStatus {
    pub const SUCCESS: CommandStatus = CommandStatus { code: Some(0) };

    pub fn exited(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for CommandStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit status {}", code),
            None => f.write_str("termination by signal"),
        }
    }
}

/// Captured result of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: CommandStatus,
    /// stdout followed by stderr.
    pub combined: String,
}

impl CommandOutput {
    pub fn success(combined: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::SUCCESS,
            combined: combined.into(),
        }
    }

    pub fn failure(code: i32, combined: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::exited(code),
            combined: combined.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("failed to start process")]
    Spawn(#[source] std::io::Error),

    #[error("deadline of {0:?} exceeded")]
    TimedOut(Duration),
}

/// Spawns programs and locates executables.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with captured combined output.
    async fn output(
        &self,
        program: &str,
        args: &[String],
        deadline: Option<Deadline>,
    ) -> Result<CommandOutput, RunError>;

    /// Runs `program` with stdout/stderr inherited from this process.
    async fn run_inherited(
        &self,
        program: &str,
        args: &[String],
        deadline: Option<Deadline>,
    ) -> Result<CommandStatus, RunError>;

    /// Searches `PATH` for `name`.
    fn lookup(&self, name: &str) -> Option<PathBuf>;

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    fn command(program: &str, args: &[String]) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }
}

async fn with_deadline<F, T>(deadline: Option<Deadline>, fut: F) -> Result<T, RunError>
where
    F: std::future::Future<Output = std::io::Result<T>>,
{
    let result = match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline.at(), fut)
            .await
            .map_err(|_| RunError::TimedOut(deadline.budget()))?,
        None => fut.await,
    };
    result.map_err(RunError::Spawn)
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn output(
        &self,
        program: &str,
        args: &[String],
        deadline: Option<Deadline>,
    ) -> Result<CommandOutput, RunError> {
        let mut cmd = Self::command(program, args);
        let output = with_deadline(deadline, cmd.output()).await?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
        }

        Ok(CommandOutput {
            status: output.status.into(),
            combined,
        })
    }

    async fn run_inherited(
        &self,
        program: &str,
        args: &[String],
        deadline: Option<Deadline>,
    ) -> Result<CommandStatus, RunError> {
        let mut cmd = Self::command(program, args);
        cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        let status = with_deadline(deadline, cmd.status()).await?;
        Ok(status.into())
    }

    fn lookup(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }
}

/// Renders a program and its arguments as one shell-like string.
pub fn display_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted runner used across the crate's tests.

    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    type Responder = dyn Fn(&str, &[String]) -> Result<CommandOutput, RunError> + Send + Sync;

    pub struct ScriptedRunner {
        calls: Mutex<Vec<Vec<String>>>,
        responder: Box<Responder>,
        on_path: Mutex<HashMap<String, PathBuf>>,
        installs: Mutex<HashMap<String, PathBuf>>,
        files: HashSet<PathBuf>,
    }

    impl ScriptedRunner {
        /// Every command succeeds with empty output.
        pub fn new() -> Self {
            Self::responding(|_, _| Ok(CommandOutput::success("")))
        }

        pub fn responding<F>(responder: F) -> Self
        where
            F: Fn(&str, &[String]) -> Result<CommandOutput, RunError> + Send + Sync + 'static,
        {
            Self {
                calls: Mutex::new(Vec::new()),
                responder: Box::new(responder),
                on_path: Mutex::new(HashMap::new()),
                installs: Mutex::new(HashMap::new()),
                files: HashSet::new(),
            }
        }

        pub fn with_path_entry(self, name: &str, path: impl Into<PathBuf>) -> Self {
            self.on_path.lock().unwrap().insert(name.to_string(), path.into());
            self
        }

        /// `name` appears on `PATH` once any inherited command has run.
        pub fn installing(self, name: &str, path: impl Into<PathBuf>) -> Self {
            self.installs.lock().unwrap().insert(name.to_string(), path.into());
            self
        }

        pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
            self.files.insert(path.into());
            self
        }

        pub fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, program: &str, args: &[String]) -> Result<CommandOutput, RunError> {
            let mut call = vec![program.to_string()];
            call.extend(args.iter().cloned());
            self.calls.lock().unwrap().push(call);
            (self.responder)(program, args)
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn output(
            &self,
            program: &str,
            args: &[String],
            _deadline: Option<Deadline>,
        ) -> Result<CommandOutput, RunError> {
            self.record(program, args)
        }

        async fn run_inherited(
            &self,
            program: &str,
            args: &[String],
            _deadline: Option<Deadline>,
        ) -> Result<CommandStatus, RunError> {
            let result = self.record(program, args).map(|out| out.status);
            // Let concurrent callers interleave the way a real child would.
            tokio::task::yield_now().await;
            let installed: Vec<_> = self.installs.lock().unwrap().drain().collect();
            self.on_path.lock().unwrap().extend(installed);
            result
        }

        fn lookup(&self, name: &str) -> Option<PathBuf> {
            self.on_path.lock().unwrap().get(name).cloned()
        }

        fn exists(&self, path: &Path) -> bool {
            self.files.contains(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_earliest() {
        let long = Deadline::after_minutes(15);
        let short = Deadline::after_minutes(5);
        assert_eq!(long.earliest(short), short);
        assert_eq!(short.earliest(long), short);
        assert_eq!(short.budget(), Duration::from_secs(300));
    }

    #[test]
    fn test_huge_minute_budget_saturates() {
        let deadline = Deadline::after_minutes(u64::MAX);
        assert_eq!(deadline.budget(), Duration::from_secs(u64::MAX));
        assert!(!deadline.is_expired());
        assert_eq!(Deadline::after_minutes(5).earliest(deadline).budget(), Duration::from_secs(300));
        assert_eq!(minutes_to_duration(i64::MAX as u64), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(CommandStatus::exited(2).to_string(), "exit status 2");
        assert!(CommandStatus::SUCCESS.success());
        assert!(!CommandStatus { code: None }.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_captures_output() {
        let runner = SystemRunner;
        let out = runner
            .output("sh", &["-c".to_string(), "echo out; echo err 1>&2".to_string()], None)
            .await
            .unwrap();
        assert!(out.status.success());
        assert!(out.combined.contains("out"));
        assert!(out.combined.contains("err"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_enforces_deadline() {
        let runner = SystemRunner;
        let deadline = Deadline::after(Duration::from_millis(100));
        let err = runner
            .output("sleep", &["5".to_string()], Some(deadline))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::TimedOut(_)));
    }

    #[tokio::test]
    async fn test_system_runner_missing_program() {
        let err = SystemRunner
            .output("definitely-not-a-real-binary-asmscan", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Spawn(_)));
    }
}
