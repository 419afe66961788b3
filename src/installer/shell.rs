use super::{InstallContext, ToolInstaller};
use crate::error::InstallError;
use crate::events::{ScannerEvent, SharedSink};
use crate::process::{display_command, CommandRunner, Deadline, RunError};
use async_trait::async_trait;
use std::sync::Arc;

/// Command prepended to the package-name group.
pub const PACKAGE_MANAGER_PREFIX: [&str; 3] = ["sudo", "apt", "install"];

/// Separator between independent command groups in the argument list.
const GROUP_SEPARATOR: &str = "&&";

/// Installs a tool with the OS package manager.
///
/// The argument list is split on `&&` into command groups. The first group
/// holds package names and flags and is run as `sudo apt install <group>`;
/// later groups are complete commands run verbatim
/// (`["ruby", "-y", "&&", "sudo", "gem", "install", "wpscan"]`).
pub struct ShellInstaller {
    tool: String,
    groups: Vec<Vec<String>>,
    timeout_minutes: u64,
    runner: Arc<dyn CommandRunner>,
    events: SharedSink,
}

impl ShellInstaller {
    pub fn new(args: Vec<String>, timeout_minutes: u64, ctx: &InstallContext) -> Result<Self, InstallError> {
        let groups = command_groups(&args);
        let Some(tool) = args.first().filter(|a| a.as_str() != GROUP_SEPARATOR).cloned() else {
            return Err(InstallError::InvalidArguments {
                installer: "shell",
                usage: "shell <package> [<args>] [&& <command>...]".to_string(),
            });
        };

        Ok(Self {
            tool,
            groups,
            timeout_minutes,
            runner: ctx.runner.clone(),
            events: ctx.events.clone(),
        })
    }

    /// The commands this installer runs, in order.
    pub fn command_groups(&self) -> &[Vec<String>] {
        &self.groups
    }
}

/// Splits `args` on `&&` and prefixes the package group.
fn command_groups(args: &[String]) -> Vec<Vec<String>> {
    let mut groups: Vec<Vec<String>> = args
        .split(|arg| arg == GROUP_SEPARATOR)
        .filter(|group| !group.is_empty())
        .map(<[String]>::to_vec)
        .collect();

    if let Some(first) = groups.first_mut() {
        if !is_explicit_command(first) {
            let mut prefixed: Vec<String> = PACKAGE_MANAGER_PREFIX.iter().map(|s| s.to_string()).collect();
            prefixed.append(first);
            *first = prefixed;
        }
    }
    groups
}

/// A group that already starts with `sudo` is a full command, not packages.
fn is_explicit_command(group: &[String]) -> bool {
    group.first().is_some_and(|arg| arg == "sudo")
}

#[async_trait]
impl ToolInstaller for ShellInstaller {
    fn kind(&self) -> &'static str {
        "shell"
    }

    async fn install_tool(&self) -> Result<(), InstallError> {
        let deadline = Deadline::after_minutes(self.timeout_minutes);

        for group in &self.groups {
            let Some((program, args)) = group.split_first() else {
                continue;
            };
            let command = display_command(program, args);
            self.events.emit(ScannerEvent::CommandStarted {
                tool: self.tool.clone(),
                command: command.clone(),
            });

            let status = self
                .runner
                .run_inherited(program, args, Some(deadline))
                .await
                .map_err(|err| match err {
                    RunError::Spawn(source) => InstallError::Spawn {
                        command: command.clone(),
                        source,
                    },
                    RunError::TimedOut(after) => {
                        InstallError::timeout(format!("install command `{}`", command), after)
                    }
                })?;

            if !status.success() {
                return Err(InstallError::CommandFailed {
                    command,
                    status: status.to_string(),
                });
            }
        }

        self.events.emit(ScannerEvent::InstallFinished {
            tool: self.tool.clone(),
        });
        Ok(())
    }
}
