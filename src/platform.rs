//! Platform-specific paths.
//!
//! Only the configuration directory and the default install directory vary
//! by platform; everything else is configured explicitly.

use std::path::PathBuf;

/// Operating system the binary was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOS,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "macos") {
            Platform::MacOS
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Other
        }
    }

    /// Whether `sudo` and apt-style package managers can be expected.
    pub fn is_unix(&self) -> bool {
        matches!(self, Platform::Linux | Platform::MacOS | Platform::Other)
    }
}

/// Directory holding `config.toml`.
///
/// - Linux: `~/.config/asmscan/`
/// - macOS: `~/Library/Application Support/asmscan/`
/// - Windows: `%APPDATA%\asmscan\`
///
/// Falls back to `./asmscan` if no config directory can be determined.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("asmscan")
}

/// Where downloaded release binaries go by default.
///
/// `/usr/local/bin` on Unix; a per-user directory elsewhere.
pub fn default_install_dir() -> PathBuf {
    if Platform::current().is_unix() {
        return PathBuf::from("/usr/local/bin");
    }
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("asmscan")
        .join("bin")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_is_namespaced() {
        assert!(config_dir().ends_with("asmscan"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_defaults() {
        assert_eq!(Platform::current(), Platform::Linux);
        assert_eq!(default_install_dir(), PathBuf::from("/usr/local/bin"));
    }
}
