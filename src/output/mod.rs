//! Rendering of tool listings and scan results.

mod cli;
mod json;

pub use cli::{print_scan_table, print_tool_table, truncate_lines};
pub use json::{print_json, ScanReport};

use crate::model::{InstallationState, InstallationType, ScannerConfig, ToolVersion};
use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

/// Output format for listings and results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable tables
    #[default]
    Table,
    /// JSON for programmatic use
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use 'table' or 'json'", s)),
        }
    }
}

/// One row of `asmscan list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub installation_type: InstallationType,
    pub requested_version: ToolVersion,
    pub installed: bool,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl ToolStatus {
    pub fn new(config: &ScannerConfig, state: &InstallationState) -> Self {
        Self {
            name: config.name.clone(),
            installation_type: config.installation_type,
            requested_version: config.version.clone(),
            installed: state.installed,
            version: state.version.clone(),
            semantic_version: state.semantic_version().map(|v| v.to_string()),
            path: state.path.clone().or_else(|| config.executable_path.clone()),
        }
    }
}

pub fn print_tools(tools: &[ToolStatus], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => print_tool_table(tools),
        OutputFormat::Json => print_json(tools),
    }
}
