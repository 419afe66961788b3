//! Configuration file handling.
//!
//! This module provides loading and saving of asmscan configuration
//! from a TOML file.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/asmscan/config.toml`
//! - macOS: `~/Library/Application Support/asmscan/config.toml`
//! - Windows: `%APPDATA%\asmscan\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! install_dir = "/usr/local/bin"
//! install_timeout_minutes = 5
//! scan_timeout_minutes = 30
//! setup_on_register = true
//! enabled_tools = ["nmap", "subfinder", "nuclei", "dns"]
//!
//! [tools.nuclei]
//! version = "3.2.0"
//!
//! [tools.nmap]
//! base_command = "nmap -Pn -sV"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::installer::DEFAULT_INSTALL_TIMEOUT_MINUTES;
use crate::model::ToolVersion;
use crate::platform;
use crate::process::minutes_to_duration;
use crate::registry::RegistrationPolicy;
use crate::scanner::BUILTIN_TOOLS;

/// Application configuration.
///
/// Every field has a default, so a partial file (or no file at all) is a
/// valid configuration.
///
/// # Example
///
/// ```no_run
/// use asmscan::Config;
///
/// let config = Config::load().unwrap();
///
/// println!("Install dir: {}", config.install_dir.display());
/// println!("Tools: {:?}", config.enabled_tools);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where GitHub release binaries are installed.
    ///
    /// Default: `/usr/local/bin` on Unix
    pub install_dir: PathBuf,

    /// Upper bound on a single tool installation, in minutes.
    ///
    /// Default: 5
    pub install_timeout_minutes: u64,

    /// Upper bound on a single scan, in minutes. `0` disables the limit.
    ///
    /// Default: 30
    pub scan_timeout_minutes: u64,

    /// Install each tool when it is registered, dropping tools that fail.
    ///
    /// Default: true
    pub setup_on_register: bool,

    /// Tools loaded by `scan-all` and `list`.
    ///
    /// Default: every built-in tool
    pub enabled_tools: Vec<String>,

    /// Per-tool overrides, keyed by tool name.
    pub tools: HashMap<String, ToolOverride>,
}

/// Overrides for one built-in tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolOverride {
    /// Pin a version instead of `latest`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<ToolVersion>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable_path: Option<PathBuf>,

    /// Replaces the program and fixed flags; the target is still appended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_command: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            install_dir: platform::default_install_dir(),
            install_timeout_minutes: DEFAULT_INSTALL_TIMEOUT_MINUTES,
            scan_timeout_minutes: 30,
            setup_on_register: true,
            enabled_tools: BUILTIN_TOOLS.iter().map(|s| s.to_string()).collect(),
            tools: HashMap::new(),
        }
    }
}

impl Config {
    /// Loads configuration from the config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Parses a configuration document.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Saves the configuration to the config file.
    ///
    /// Creates the parent directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    ///
    /// # Example
    ///
    /// ```
    /// use asmscan::Config;
    ///
    /// let path = Config::config_path();
    /// assert!(path.ends_with("asmscan/config.toml"));
    /// ```
    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    pub fn is_enabled(&self, tool: &str) -> bool {
        self.enabled_tools.iter().any(|t| t == tool)
    }

    pub fn scan_timeout(&self) -> Option<Duration> {
        (self.scan_timeout_minutes > 0).then(|| minutes_to_duration(self.scan_timeout_minutes))
    }

    pub fn registration_policy(&self) -> RegistrationPolicy {
        if self.setup_on_register {
            RegistrationPolicy::SetupFirst
        } else {
            RegistrationPolicy::Unconditional
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.install_timeout_minutes, 5);
        assert_eq!(config.scan_timeout_minutes, 30);
        assert!(config.setup_on_register);
        assert_eq!(config.enabled_tools.len(), BUILTIN_TOOLS.len());
        assert!(config.tools.is_empty());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config = Config::from_toml(
            r#"
            scan_timeout_minutes = 0
            enabled_tools = ["nmap"]

            [tools.nuclei]
            version = "3.2.0"
            "#,
        )
        .unwrap();

        assert_eq!(config.install_timeout_minutes, 5);
        assert!(config.scan_timeout().is_none());
        assert!(config.is_enabled("nmap"));
        assert!(!config.is_enabled("nuclei"));
        assert_eq!(
            config.tools["nuclei"].version,
            Some(ToolVersion::Pinned("3.2.0".to_string()))
        );
        assert!(config.tools["nuclei"].base_command.is_none());
    }

    #[test]
    fn test_registration_policy() {
        let mut config = Config::default();
        assert_eq!(config.registration_policy(), RegistrationPolicy::SetupFirst);
        config.setup_on_register = false;
        assert_eq!(config.registration_policy(), RegistrationPolicy::Unconditional);
    }

    #[test]
    fn test_default_config_roundtrips() {
        let rendered = Config::generate_default_config();
        let parsed = Config::from_toml(&rendered).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_huge_scan_timeout_saturates() {
        let config = Config::from_toml("scan_timeout_minutes = 9223372036854775807").unwrap();
        assert_eq!(config.scan_timeout(), Some(Duration::from_secs(u64::MAX)));

        let config = Config::from_toml("install_timeout_minutes = 9223372036854775807").unwrap();
        assert!(!crate::process::Deadline::after_minutes(config.install_timeout_minutes).is_expired());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(Config::from_toml("scan_timeout_minutes = \"soon\"").is_err());
    }
}
