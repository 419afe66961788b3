use crate::model::ScannerResult;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A scan result with the context needed to read it later.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub tool: String,
    pub target: String,
    pub scan_time: DateTime<Utc>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub result: ScannerResult,
}

impl ScanReport {
    pub fn new(tool: impl Into<String>, target: impl Into<String>, result: ScannerResult) -> Self {
        Self {
            tool: tool.into(),
            target: target.into(),
            scan_time: Utc::now(),
            success: result.is_success(),
            error: None,
            result,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}
