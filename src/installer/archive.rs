//! Release archive handling.
//!
//! Pulls a single executable out of a `.zip` or `.tar.gz`/`.tgz` archive and
//! writes it to its destination. [`prepare_destination`] runs first and
//! escalates with `sudo` when the destination is not writable by the
//! current user.

use crate::error::InstallError;
use crate::events::{EventSink, ScannerEvent};
use crate::process::{CommandRunner, Deadline, RunError};
use flate2::read::GzDecoder;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::Path;

/// Supported archive formats, detected by file name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
}

impl ArchiveKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else {
            None
        }
    }
}

pub fn is_archive(name: &str) -> bool {
    ArchiveKind::from_name(name).is_some()
}

/// Whether an archive member is the executable for `tool`.
///
/// Matches when the member's base name contains the tool name, or the whole
/// member path equals it.
pub fn member_matches(member: &str, tool: &str) -> bool {
    let base = member.rsplit('/').next().unwrap_or(member);
    base.contains(tool) || member == tool
}

/// Extracts the member matching `tool` from the archive at `archive_path`.
///
/// `archive_name` is the original artifact name, used to pick the format.
///
/// # Errors
///
/// Returns [`InstallError::ExecutableNotFound`] if no member matches, and
/// [`InstallError::UnsupportedArchive`] for unknown suffixes.
pub fn extract_executable(
    archive_path: &Path,
    dest: &Path,
    tool: &str,
    archive_name: &str,
) -> Result<(), InstallError> {
    match ArchiveKind::from_name(archive_name) {
        Some(ArchiveKind::Zip) => extract_from_zip(archive_path, dest, tool),
        Some(ArchiveKind::TarGz) => extract_from_tar_gz(archive_path, dest, tool),
        None => Err(InstallError::UnsupportedArchive(archive_name.to_string())),
    }
}

pub fn extract_from_zip(archive_path: &Path, dest: &Path, tool: &str) -> Result<(), InstallError> {
    let archive_display = archive_path.display().to_string();
    let file = File::open(archive_path)
        .map_err(|e| InstallError::io(format!("failed to open zip file {}", archive_display), e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|source| InstallError::Archive {
        archive: archive_display.clone(),
        source,
    })?;

    for i in 0..archive.len() {
        let mut member = archive.by_index(i).map_err(|source| InstallError::Archive {
            archive: archive_display.clone(),
            source,
        })?;
        if member.is_dir() || !member_matches(member.name(), tool) {
            continue;
        }

        let mut target = open_destination(dest)?;
        io::copy(&mut member, &mut target).map_err(|e| {
            InstallError::io(format!("failed to copy {} out of {}", member.name(), archive_display), e)
        })?;
        return Ok(());
    }

    Err(InstallError::ExecutableNotFound {
        tool: tool.to_string(),
        archive: archive_display,
    })
}

pub fn extract_from_tar_gz(archive_path: &Path, dest: &Path, tool: &str) -> Result<(), InstallError> {
    let archive_display = archive_path.display().to_string();
    let file = File::open(archive_path)
        .map_err(|e| InstallError::io(format!("failed to open archive {}", archive_display), e))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));

    let entries = archive
        .entries()
        .map_err(|e| InstallError::io(format!("failed to read tar.gz archive {}", archive_display), e))?;

    for entry in entries {
        let mut entry = entry
            .map_err(|e| InstallError::io(format!("failed to read tar header in {}", archive_display), e))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry
            .path()
            .map_err(|e| InstallError::io("invalid tar member path", e))?
            .to_string_lossy()
            .into_owned();
        if !member_matches(&name, tool) {
            continue;
        }

        let mut target = open_destination(dest)?;
        io::copy(&mut entry, &mut target).map_err(|e| {
            InstallError::io(format!("failed to copy {} out of {}", name, archive_display), e)
        })?;
        return Ok(());
    }

    Err(InstallError::ExecutableNotFound {
        tool: tool.to_string(),
        archive: archive_display,
    })
}

/// Copies a plain (non-archive) download to its destination.
pub fn copy_file(src: &Path, dest: &Path) -> Result<(), InstallError> {
    let mut source = File::open(src)
        .map_err(|e| InstallError::io(format!("failed to open {}", src.display()), e))?;
    let mut target = open_destination(dest)?;
    io::copy(&mut source, &mut target)
        .map_err(|e| InstallError::io(format!("failed to write {}", dest.display()), e))?;
    Ok(())
}

/// Opens `path` for writing, truncating it. The file may already exist
/// from [`prepare_destination`].
pub fn open_destination(path: &Path) -> Result<File, InstallError> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| InstallError::io(format!("failed to create {}", path.display()), e))
}

/// Makes sure `path` and its parent directory exist and that the current
/// user can write to `path`.
///
/// On a permission error the directory and an empty file are created as
/// root, and ownership of the file is handed back to the current user.
/// Every `sudo` step runs under `deadline`.
pub async fn prepare_destination(
    path: &Path,
    runner: &dyn CommandRunner,
    events: &dyn EventSink,
    deadline: Deadline,
) -> Result<(), InstallError> {
    match create_parent_and_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::PermissionDenied => {
            escalate(path, runner, events, deadline).await
        }
        Err(err) => Err(InstallError::io(format!("failed to create {}", path.display()), err)),
    }
}

async fn create_parent_and_file(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .await?;
    Ok(())
}

/// `sudo mkdir -p <parent>`, `sudo touch <path>`, `sudo chown <uid>:<gid> <path>`.
pub async fn escalate(
    path: &Path,
    runner: &dyn CommandRunner,
    events: &dyn EventSink,
    deadline: Deadline,
) -> Result<(), InstallError> {
    events.emit(ScannerEvent::Escalating {
        path: path.to_path_buf(),
    });

    let target = path.display().to_string();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        let parent = parent.display().to_string();
        sudo(runner, &["mkdir", "-p", &parent], "create directory", deadline).await?;
    }
    sudo(runner, &["touch", &target], "create file", deadline).await?;
    let owner = current_owner()?;
    sudo(runner, &["chown", &owner, &target], "change file ownership", deadline).await
}

/// Marks `path` as executable (`0755`).
pub fn set_executable(path: &Path) -> Result<(), InstallError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|e| {
            InstallError::io(format!("failed to make {} executable", path.display()), e)
        })?;
    }
    #[cfg(not(unix))]
    {
        fs::metadata(path)
            .map_err(|e| InstallError::io(format!("failed to stat {}", path.display()), e))?;
    }
    Ok(())
}

async fn sudo(
    runner: &dyn CommandRunner,
    args: &[&str],
    step: &str,
    deadline: Deadline,
) -> Result<(), InstallError> {
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    let command = format!("sudo {}", args.join(" "));
    let status = runner
        .run_inherited("sudo", &args, Some(deadline))
        .await
        .map_err(|err| match err {
            RunError::Spawn(source) => InstallError::Escalation {
                step: step.to_string(),
                source,
            },
            RunError::TimedOut(after) => InstallError::timeout(format!("`{}`", command), after),
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(InstallError::EscalationDenied {
            command,
            status: status.to_string(),
        })
    }
}

#[cfg(unix)]
fn current_owner() -> Result<String, InstallError> {
    use nix::unistd::{getgid, getuid};
    Ok(format!("{}:{}", getuid(), getgid()))
}

#[cfg(not(unix))]
fn current_owner() -> Result<String, InstallError> {
    Err(InstallError::Escalation {
        step: "determine the current user".to_string(),
        source: io::Error::new(ErrorKind::Unsupported, "sudo fallback requires a unix host"),
    })
}
