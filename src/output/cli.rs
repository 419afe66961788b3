use super::ToolStatus;
use crate::model::{ScannerResult, UNKNOWN_VERSION};
use anyhow::Result;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct ToolRow {
    #[tabled(rename = "Tool")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Requested")]
    requested: String,
    #[tabled(rename = "Installed")]
    installed: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Path")]
    path: String,
}

pub fn print_tool_table(tools: &[ToolStatus]) -> Result<()> {
    if tools.is_empty() {
        println!("No tools enabled.");
        return Ok(());
    }

    let rows: Vec<ToolRow> = tools
        .iter()
        .map(|t| ToolRow {
            name: t.name.clone(),
            kind: t.installation_type.to_string(),
            requested: t.requested_version.to_string(),
            installed: if t.installed {
                "\x1b[32myes\x1b[0m".to_string()
            } else {
                "no".to_string()
            },
            version: format_version(t),
            path: t
                .path
                .as_ref()
                .map(|p| truncate(&p.display().to_string(), 40))
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);

    let installed = tools.iter().filter(|t| t.installed).count();
    println!();
    println!("{}/{} tools installed", installed, tools.len());
    Ok(())
}

/// Prints errors, then data, each capped at `limit` lines.
pub fn print_scan_table(tool: &str, target: &str, result: &ScannerResult, limit: usize) -> Result<()> {
    println!();
    println!("{} results for {}:", tool, target);

    if !result.errors.is_empty() {
        println!();
        println!("\x1b[31mErrors ({}):\x1b[0m", result.errors.len());
        print_lines(&result.errors, limit);
    }

    println!();
    if result.data.is_empty() {
        println!("No data returned.");
    } else {
        println!("Data ({} lines):", result.data.len());
        print_lines(&result.data, limit);
    }
    Ok(())
}

fn print_lines(lines: &[String], limit: usize) {
    let (shown, hidden) = truncate_lines(lines, limit);
    for line in shown {
        println!("  {}", line);
    }
    if hidden > 0 {
        println!("  ... and {} more", hidden);
    }
}

/// The first `limit` lines and how many were left out. A limit of 0 shows
/// everything.
pub fn truncate_lines(lines: &[String], limit: usize) -> (&[String], usize) {
    if limit == 0 || lines.len() <= limit {
        (lines, 0)
    } else {
        (&lines[..limit], lines.len() - limit)
    }
}

fn format_version(tool: &ToolStatus) -> String {
    if !tool.installed || tool.version.is_empty() || tool.version == UNKNOWN_VERSION {
        return "-".to_string();
    }
    match &tool.semantic_version {
        Some(v) => v.clone(),
        None => truncate(&tool.version, 30),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("line {}", i)).collect()
    }

    #[test]
    fn test_truncate_lines() {
        let all = lines(12);
        let (shown, hidden) = truncate_lines(&all, 10);
        assert_eq!(shown.len(), 10);
        assert_eq!(hidden, 2);

        let (shown, hidden) = truncate_lines(&all, 0);
        assert_eq!(shown.len(), 12);
        assert_eq!(hidden, 0);

        let (shown, hidden) = truncate_lines(&all[..3], 10);
        assert_eq!(shown.len(), 3);
        assert_eq!(hidden, 0);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("/usr/local/bin/really-long-name", 12), "/usr/loca...");
    }
}
