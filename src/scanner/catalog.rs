use super::{CommandScanner, DnsScanner, Scanner};
use crate::config::Config;
use crate::installer::InstallContext;
use crate::model::{InstallationType, ScannerConfig};
use crate::target::extract_domain;
use std::sync::Arc;

/// Names of every built-in tool, in listing order.
pub const BUILTIN_TOOLS: [&str; 11] = [
    "nmap",
    "whois",
    "masscan",
    "wpscan",
    "nuclei",
    "subfinder",
    "trufflehog",
    "sqlmap",
    "semgrep",
    "aiodnsbrute",
    DnsScanner::NAME,
];

const WPSCAN_PACKAGES: [&str; 16] = [
    "ruby",
    "ruby-dev",
    "git",
    "curl",
    "libcurl4-openssl-dev",
    "make",
    "zlib1g-dev",
    "gawk",
    "g++",
    "gcc",
    "-y",
    "&&",
    "sudo",
    "gem",
    "install",
    "wpscan",
];

fn github_release(owner_repo: &str) -> String {
    format!("https://api.github.com/repos/{}/releases/latest", owner_repo)
}

/// Descriptor of a built-in tool before config overrides.
fn builtin(name: &str, config: &Config) -> Option<ScannerConfig> {
    let bin = |tool: &str| config.install_dir.join(tool);

    let descriptor = match name {
        "nmap" => ScannerConfig::new("nmap")
            .executable_path("/usr/bin/nmap")
            .base_command("nmap -sV -T4")
            .installation(InstallationType::Shell),
        "whois" => ScannerConfig::new("whois")
            .executable_path("/usr/bin/whois")
            .installation(InstallationType::Shell),
        "masscan" => ScannerConfig::new("masscan")
            .executable_path("/usr/bin/masscan")
            .base_command("sudo masscan")
            .installation(InstallationType::Shell)
            .install_packages(["masscan", "libpcap-dev"]),
        "wpscan" => ScannerConfig::new("wpscan")
            .executable_path("/usr/local/bin/wpscan")
            .base_command("wpscan --url")
            .installation(InstallationType::Shell)
            .install_packages(WPSCAN_PACKAGES),
        "nuclei" => ScannerConfig::new("nuclei")
            .executable_path(bin("nuclei"))
            .base_command("nuclei -t cves/ -u")
            .github(
                github_release("projectdiscovery/nuclei"),
                "nuclei_(.*)_linux_amd64.zip",
            ),
        "subfinder" => ScannerConfig::new("subfinder")
            .executable_path(bin("subfinder"))
            .base_command("subfinder -d")
            .github(
                github_release("projectdiscovery/subfinder"),
                "subfinder_.*_linux_amd64.zip",
            ),
        "trufflehog" => ScannerConfig::new("trufflehog")
            .executable_path(bin("trufflehog"))
            .github(
                github_release("trufflesecurity/trufflehog"),
                "trufflehog_.*_linux_amd64.tar.gz",
            ),
        "sqlmap" => ScannerConfig::new("sqlmap")
            .executable_path("/usr/local/bin/sqlmap")
            .base_command("sqlmap -u")
            .installation(InstallationType::Python),
        "semgrep" => ScannerConfig::new("semgrep")
            .executable_path("/usr/local/bin/semgrep")
            .base_command("semgrep scan")
            .installation(InstallationType::Python),
        "aiodnsbrute" => ScannerConfig::new("aiodnsbrute")
            .executable_path("/usr/local/bin/aiodnsbrute")
            .base_command("aiodnsbrute")
            .installation(InstallationType::Python),
        DnsScanner::NAME => ScannerConfig::embedded(DnsScanner::NAME),
        _ => return None,
    };
    Some(descriptor)
}

/// Applies a `[tools.<name>]` section on top of a built-in descriptor.
fn with_overrides(mut descriptor: ScannerConfig, config: &Config) -> ScannerConfig {
    let Some(overrides) = config.tools.get(&descriptor.name) else {
        return descriptor;
    };
    if let Some(version) = &overrides.version {
        descriptor.version = version.clone();
    }
    if let Some(path) = &overrides.executable_path {
        descriptor.executable_path = Some(path.clone());
    }
    if let Some(command) = &overrides.base_command {
        descriptor.base_command = command.clone();
    }
    descriptor
}

fn descriptor(name: &str, config: &Config) -> Option<ScannerConfig> {
    builtin(name, config).map(|d| with_overrides(d, config))
}

/// Descriptors of every built-in tool with config overrides applied.
pub fn known_tools(config: &Config) -> Vec<ScannerConfig> {
    BUILTIN_TOOLS
        .iter()
        .filter_map(|name| descriptor(name, config))
        .collect()
}

/// Tools that take a bare host rather than a URL or path.
fn wants_domain(name: &str) -> bool {
    matches!(name, "nmap" | "whois" | "masscan" | "subfinder" | "aiodnsbrute")
}

fn build(descriptor: ScannerConfig, config: &Config, ctx: &InstallContext) -> Arc<dyn Scanner> {
    if descriptor.name == DnsScanner::NAME {
        return Arc::new(DnsScanner::new(ctx.events.clone()));
    }

    let domain_only = wants_domain(&descriptor.name);
    let mut scanner = CommandScanner::new(descriptor, ctx.clone())
        .with_install_timeout(config.install_timeout_minutes)
        .with_scan_timeout(config.scan_timeout());
    if domain_only {
        scanner = scanner.with_normalizer(extract_domain);
    }
    Arc::new(scanner)
}

/// Returns all scanners enabled in `config`.
pub fn all_scanners(config: &Config, ctx: &InstallContext) -> Vec<Arc<dyn Scanner>> {
    known_tools(config)
        .into_iter()
        .filter(|d| config.is_enabled(&d.name))
        .map(|d| build(d, config, ctx))
        .collect()
}

/// Returns the built-in scanner named `name`, enabled or not.
pub fn get_scanner(name: &str, config: &Config, ctx: &InstallContext) -> Option<Arc<dyn Scanner>> {
    let name = name.trim().to_lowercase();
    descriptor(&name, config).map(|d| build(d, config, ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolOverride;
    use crate::events::RecordingSink;
    use crate::model::ToolVersion;
    use crate::process::testing::ScriptedRunner;
    use std::path::{Path, PathBuf};

    fn ctx() -> InstallContext {
        InstallContext::new(Arc::new(ScriptedRunner::new()), RecordingSink::new())
    }

    #[test]
    fn test_known_tools_cover_builtins() {
        let tools = known_tools(&Config::default());
        assert_eq!(tools.len(), BUILTIN_TOOLS.len());

        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, BUILTIN_TOOLS.to_vec());
    }

    #[test]
    fn test_github_tools_use_install_dir() {
        let config = Config {
            install_dir: PathBuf::from("/opt/asm/bin"),
            ..Config::default()
        };
        let tools = known_tools(&config);
        let nuclei = tools.iter().find(|t| t.name == "nuclei").unwrap();

        assert_eq!(nuclei.installation_type, InstallationType::Github);
        assert_eq!(nuclei.executable_path.as_deref(), Some(Path::new("/opt/asm/bin/nuclei")));
        assert_eq!(
            nuclei.install_args().unwrap()[0],
            "https://api.github.com/repos/projectdiscovery/nuclei/releases/latest"
        );
    }

    #[test]
    fn test_pip_tools_have_known_locations() {
        let tools = known_tools(&Config::default());
        for (name, path, command) in [
            ("sqlmap", "/usr/local/bin/sqlmap", vec!["sqlmap", "-u"]),
            ("semgrep", "/usr/local/bin/semgrep", vec!["semgrep", "scan"]),
            ("aiodnsbrute", "/usr/local/bin/aiodnsbrute", vec!["aiodnsbrute"]),
        ] {
            let tool = tools.iter().find(|t| t.name == name).unwrap();
            assert_eq!(tool.installation_type, InstallationType::Python);
            assert_eq!(tool.executable_path.as_deref(), Some(Path::new(path)));
            assert_eq!(tool.base_command.split_whitespace().collect::<Vec<_>>(), command);
        }
    }

    #[test]
    fn test_wpscan_install_groups() {
        let tools = known_tools(&Config::default());
        let wpscan = tools.iter().find(|t| t.name == "wpscan").unwrap();
        let args = wpscan.install_args().unwrap();
        assert_eq!(args.first().map(String::as_str), Some("ruby"));
        assert!(args.iter().any(|a| a == "&&"));
        assert_eq!(args.last().map(String::as_str), Some("wpscan"));
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = Config::default();
        config.tools.insert(
            "nmap".to_string(),
            ToolOverride {
                version: Some(ToolVersion::from("7.94")),
                executable_path: Some(PathBuf::from("/opt/nmap/bin/nmap")),
                base_command: Some("nmap -Pn".to_string()),
            },
        );

        let tools = known_tools(&config);
        let nmap = tools.iter().find(|t| t.name == "nmap").unwrap();
        assert_eq!(nmap.version, ToolVersion::Pinned("7.94".to_string()));
        assert_eq!(nmap.base_command, "nmap -Pn");
        assert_eq!(nmap.executable_path.as_deref(), Some(Path::new("/opt/nmap/bin/nmap")));
    }

    #[test]
    fn test_all_scanners_respects_enabled_tools() {
        let config = Config {
            enabled_tools: vec!["nmap".to_string(), "dns".to_string()],
            ..Config::default()
        };
        let scanners = all_scanners(&config, &ctx());
        let names: Vec<&str> = scanners.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["nmap", "dns"]);
    }

    #[test]
    fn test_get_scanner() {
        let config = Config::default();
        assert!(get_scanner("Subfinder", &config, &ctx()).is_some());
        assert!(get_scanner("dns", &config, &ctx()).unwrap().config().is_embedded());
        assert!(get_scanner("metasploit", &config, &ctx()).is_none());
    }

    #[tokio::test]
    async fn test_domain_tools_normalize_target() {
        let runner = Arc::new(ScriptedRunner::new().with_file("/usr/bin/whois"));
        let ctx = InstallContext::new(runner.clone(), RecordingSink::new());
        let whois = get_scanner("whois", &Config::default(), &ctx).unwrap();

        whois.scan("https://example.com/about").await.unwrap();
        assert_eq!(runner.calls().pop().unwrap(), vec!["whois", "example.com"]);
    }
}
