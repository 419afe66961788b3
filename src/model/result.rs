use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Version text recorded when the version probe itself fails.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Version text recorded when the probe succeeds but prints nothing.
pub const INSTALLED_VERSION: &str = "installed";

/// What is known about the tool backing a scanner.
///
/// `installed` only ever moves from `false` to `true` within a process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationState {
    pub installed: bool,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl InstallationState {
    /// State for an in-process scanner that never needs installing.
    pub fn embedded(version: impl Into<String>) -> Self {
        Self {
            installed: true,
            version: version.into(),
            path: None,
        }
    }

    /// First semver-looking token of the probed version text.
    ///
    /// Handles the usual shapes: `nmap version 7.94`, `v3.1.4`,
    /// `Version: 2.11.0 (abc123)`. Two-component versions are padded.
    pub fn semantic_version(&self) -> Option<semver::Version> {
        self.version
            .split(|c: char| c.is_whitespace() || c == ',' || c == '(' || c == ')')
            .filter_map(|token| {
                let token = token.trim_start_matches(['v', 'V']);
                if !token.starts_with(|c: char| c.is_ascii_digit()) {
                    return None;
                }
                semver::Version::parse(token).ok().or_else(|| {
                    let dots = token.matches('.').count();
                    if dots == 1 {
                        semver::Version::parse(&format!("{}.0", token)).ok()
                    } else {
                        None
                    }
                })
            })
            .next()
    }
}

/// Output of one scan.
///
/// Both buckets are append-only. Whatever a scan collected before failing
/// is returned alongside the error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerResult {
    pub data: Vec<String>,
    pub errors: Vec<String>,
}

impl ScannerResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_data(&mut self, line: impl Into<String>) {
        self.data.push(line.into());
    }

    pub fn push_error(&mut self, line: impl Into<String>) {
        self.errors.push(line.into());
    }

    /// Appends every trimmed non-blank line of `output` to `data`.
    pub fn extend_data_lines(&mut self, output: &str) {
        self.data.extend(non_blank_lines(output));
    }

    /// Appends every trimmed non-blank line of `output` to `errors`.
    pub fn extend_error_lines(&mut self, output: &str) {
        self.errors.extend(non_blank_lines(output));
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.errors.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

fn non_blank_lines(output: &str) -> impl Iterator<Item = String> + '_ {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(version: &str) -> InstallationState {
        InstallationState {
            installed: true,
            version: version.to_string(),
            path: None,
        }
    }

    #[test]
    fn test_semantic_version_shapes() {
        assert_eq!(
            state("Nmap version 7.94 ( https://nmap.org )").semantic_version(),
            Some(semver::Version::new(7, 94, 0))
        );
        assert_eq!(
            state("v3.1.4").semantic_version(),
            Some(semver::Version::new(3, 1, 4))
        );
        assert_eq!(
            state("Version: 2.11.0").semantic_version(),
            Some(semver::Version::new(2, 11, 0))
        );
        assert_eq!(state("unknown").semantic_version(), None);
    }

    #[test]
    fn test_extend_lines_skips_blank() {
        let mut result = ScannerResult::new();
        result.extend_data_lines("  a  \n\n\t\nb\n");
        assert_eq!(result.data, vec!["a", "b"]);
        assert!(result.is_success());

        result.extend_error_lines("\n   \n");
        assert!(result.errors.is_empty());
    }
}
