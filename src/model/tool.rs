use crate::error::InstallError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Installer strategy tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallationType {
    /// Download a release artifact from GitHub.
    Github,
    /// Install OS packages through the system package manager.
    Shell,
    /// Install a package with pip.
    Python,
    /// Reserved; always rejected by the installer factory.
    Internal,
    /// In-process scanner, nothing to install.
    Embedded,
}

impl InstallationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallationType::Github => "github",
            InstallationType::Shell => "shell",
            InstallationType::Python => "python",
            InstallationType::Internal => "internal",
            InstallationType::Embedded => "embedded",
        }
    }
}

impl fmt::Display for InstallationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstallationType {
    type Err = InstallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "github" => Ok(InstallationType::Github),
            "shell" => Ok(InstallationType::Shell),
            "python" | "pip" => Ok(InstallationType::Python),
            "internal" => Ok(InstallationType::Internal),
            "embedded" | "none" | "" => Ok(InstallationType::Embedded),
            other => Err(InstallError::Unsupported(other.to_string())),
        }
    }
}

/// Requested version of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ToolVersion {
    /// Whatever the installer resolves as newest.
    #[default]
    Latest,
    /// Built into this process.
    Embedded,
    /// A concrete version string.
    Pinned(String),
}

impl ToolVersion {
    pub fn as_str(&self) -> &str {
        match self {
            ToolVersion::Latest => "latest",
            ToolVersion::Embedded => "embedded",
            ToolVersion::Pinned(v) => v,
        }
    }

    pub fn is_latest(&self) -> bool {
        matches!(self, ToolVersion::Latest)
    }
}

impl From<&str> for ToolVersion {
    fn from(s: &str) -> Self {
        match s.trim() {
            "" | "latest" => ToolVersion::Latest,
            "embedded" => ToolVersion::Embedded,
            other => ToolVersion::Pinned(other.to_string()),
        }
    }
}

impl From<String> for ToolVersion {
    fn from(s: String) -> Self {
        ToolVersion::from(s.as_str())
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ToolVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ToolVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ToolVersion::from(s))
    }
}

/// Where to find a GitHub release artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubOptions {
    /// Releases API URL (`https://api.github.com/repos/<o>/<r>/releases/latest`)
    /// or a direct download URL.
    pub install_link: String,
    /// Regular expression matched against release asset names.
    pub asset_pattern: String,
}

/// Declarative description of one tool.
///
/// Built once with the builder methods and then only read; the resolved
/// on-disk location of the tool lives in [`InstallationState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannerConfig {
    /// Registry key and PATH lookup name.
    pub name: String,
    pub version: ToolVersion,
    /// Expected location of the installed binary; `None` for embedded scanners.
    pub executable_path: Option<PathBuf>,
    /// Program plus fixed flags; the target is appended as the last argument.
    pub base_command: String,
    pub installation_type: InstallationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<GithubOptions>,
    /// Package-manager arguments for shell installs. Empty means `[name, "-y"]`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub install_packages: Vec<String>,
}

impl ScannerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            base_command: name.clone(),
            name,
            version: ToolVersion::Latest,
            executable_path: None,
            installation_type: InstallationType::Embedded,
            github: None,
            install_packages: Vec::new(),
        }
    }

    /// Descriptor for an in-process scanner.
    pub fn embedded(name: impl Into<String>) -> Self {
        let mut config = Self::new(name);
        config.version = ToolVersion::Embedded;
        config.base_command = String::new();
        config
    }

    pub fn version(mut self, version: impl Into<ToolVersion>) -> Self {
        self.version = version.into();
        self
    }

    pub fn executable_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    pub fn base_command(mut self, command: impl Into<String>) -> Self {
        self.base_command = command.into();
        self
    }

    pub fn installation(mut self, kind: InstallationType) -> Self {
        self.installation_type = kind;
        self
    }

    pub fn github(mut self, install_link: impl Into<String>, asset_pattern: impl Into<String>) -> Self {
        self.installation_type = InstallationType::Github;
        self.github = Some(GithubOptions {
            install_link: install_link.into(),
            asset_pattern: asset_pattern.into(),
        });
        self
    }

    pub fn install_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.install_packages = packages.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_embedded(&self) -> bool {
        self.installation_type == InstallationType::Embedded
    }

    /// Whitespace-tokenized base command. Falls back to the executable path
    /// when no command template is configured.
    pub fn command_parts(&self) -> Vec<String> {
        let parts: Vec<String> = self
            .base_command
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if !parts.is_empty() {
            return parts;
        }
        self.executable_path
            .as_deref()
            .map(|p| vec![p.display().to_string()])
            .unwrap_or_default()
    }

    /// Directory the installed binary is expected in.
    pub fn install_dir(&self) -> Option<&Path> {
        self.executable_path
            .as_deref()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Flat argument list handed to the installer factory for this tool.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::InvalidArguments`] for a GitHub install without
    /// release options or a destination path.
    pub fn install_args(&self) -> Result<Vec<String>, InstallError> {
        match self.installation_type {
            InstallationType::Github => {
                let github = self.github.as_ref().ok_or_else(|| InstallError::InvalidArguments {
                    installer: "github",
                    usage: format!("{} has no GitHub release options", self.name),
                })?;
                let dest = self.executable_path.as_ref().ok_or_else(|| {
                    InstallError::InvalidArguments {
                        installer: "github",
                        usage: format!("{} has no executable path", self.name),
                    }
                })?;
                Ok(vec![
                    github.install_link.clone(),
                    github.asset_pattern.clone(),
                    self.version.as_str().to_string(),
                    dest.display().to_string(),
                ])
            }
            InstallationType::Shell => {
                if self.install_packages.is_empty() {
                    Ok(vec![self.name.clone(), "-y".to_string()])
                } else {
                    Ok(self.install_packages.clone())
                }
            }
            InstallationType::Python => {
                let mut args = vec![self.name.clone(), self.version.as_str().to_string()];
                args.extend(self.install_packages.iter().cloned());
                Ok(args)
            }
            InstallationType::Internal | InstallationType::Embedded => Ok(Vec::new()),
        }
    }
}
