use anyhow::{anyhow, Context, Result};
use asmscan::{
    config::Config,
    error::error_chain,
    installer::InstallContext,
    output::{print_json, print_scan_table, print_tools, OutputFormat, ScanReport, ToolStatus},
    registry::ScannerRegistry,
    scanner::{all_scanners, get_scanner, Scanner},
};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
}

#[derive(Parser)]
#[command(name = "asmscan")]
#[command(
    author,
    version,
    about = "Run attack-surface scanners, installing the tools they need"
)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List known tools and whether they are installed
    List {
        /// Output format (table, json)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Install one or more tools
    Setup {
        /// Tool names (see `asmscan list`)
        #[arg(required = true)]
        tools: Vec<String>,
    },

    /// Run one tool against a target
    Scan {
        tool: String,
        target: String,

        /// Show at most this many lines per section (0 for all)
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Output format (table, json)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Run every enabled tool against a target concurrently
    ScanAll {
        target: String,

        /// Show at most this many lines per section (0 for all)
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Output format (table, json)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("asmscan=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("asmscan=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<u8> {
    let config = Config::load().context("Failed to load configuration")?;
    let ctx = InstallContext::system();

    match cli.command {
        Commands::List { format } => {
            list_tools(&config, &ctx, parse_format(format)?).await?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Setup { tools } => setup_tools(&config, &ctx, &tools).await,
        Commands::Scan {
            tool,
            target,
            limit,
            format,
        } => scan_one(&config, &ctx, &tool, &target, limit, parse_format(format)?).await,
        Commands::ScanAll {
            target,
            limit,
            format,
        } => scan_all(&config, &ctx, &target, limit, parse_format(format)?).await,
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn parse_format(format: Option<String>) -> Result<OutputFormat> {
    match format {
        Some(f) => OutputFormat::from_str(&f).map_err(|e| anyhow!(e)),
        None => Ok(OutputFormat::Table),
    }
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    pb
}

fn lookup(name: &str, config: &Config, ctx: &InstallContext) -> Result<Arc<dyn Scanner>> {
    get_scanner(name, config, ctx)
        .ok_or_else(|| anyhow!("Unknown tool: {}. Run 'asmscan list' to see available tools", name))
}

async fn list_tools(config: &Config, ctx: &InstallContext, format: OutputFormat) -> Result<()> {
    let scanners = all_scanners(config, ctx);

    let statuses = join_all(scanners.iter().map(|scanner| async move {
        scanner.is_installed().await;
        ToolStatus::new(scanner.config(), &scanner.installation_state().await)
    }))
    .await;

    print_tools(&statuses, format)
}

async fn setup_tools(config: &Config, ctx: &InstallContext, names: &[String]) -> Result<u8> {
    let scanners = names
        .iter()
        .map(|name| lookup(name, config, ctx))
        .collect::<Result<Vec<_>>>()?;

    let mut code = exit_codes::SUCCESS;
    for scanner in scanners {
        let pb = spinner(format!("Setting up {}...", scanner.name()));
        match scanner.setup().await {
            Ok(()) => {
                let state = scanner.installation_state().await;
                pb.finish_with_message(format!("{} ready ({})", scanner.name(), state.version));
            }
            Err(e) => {
                pb.finish_with_message(format!("{} failed: {}", scanner.name(), error_chain(&e)));
                code = exit_codes::ERROR;
            }
        }
    }
    Ok(code)
}

async fn scan_one(
    config: &Config,
    ctx: &InstallContext,
    tool: &str,
    target: &str,
    limit: usize,
    format: OutputFormat,
) -> Result<u8> {
    let scanner = lookup(tool, config, ctx)?;

    let pb = spinner(format!("Setting up {}...", scanner.name()));
    let setup = scanner.setup().await;
    pb.finish_and_clear();
    setup.with_context(|| format!("Failed to set up {}", tool))?;

    let report = run_scan(scanner.as_ref(), target).await;
    let code = if report.success {
        exit_codes::SUCCESS
    } else {
        exit_codes::ERROR
    };
    print_reports(&[report], limit, format)?;
    Ok(code)
}

async fn scan_all(
    config: &Config,
    ctx: &InstallContext,
    target: &str,
    limit: usize,
    format: OutputFormat,
) -> Result<u8> {
    let registry = ScannerRegistry::with_policy(config.registration_policy(), ctx.events.clone());

    // No spinner here: installers inherit the terminal for sudo prompts.
    eprintln!("Preparing tools...");
    let refused = registry.register_all(all_scanners(config, ctx)).await;
    for (tool, err) in &refused {
        eprintln!("\x1b[33mSkipping {}: {}\x1b[0m", tool, error_chain(err));
    }
    let skipped = refused.len();
    eprintln!("{} tools ready, {} skipped", registry.len(), skipped);

    if registry.is_empty() {
        return Err(anyhow!("No tools available to scan {}", target));
    }

    let mut scanners: Vec<_> = registry.get_all().into_values().collect();
    scanners.sort_by(|a, b| a.name().cmp(b.name()));

    let pb = spinner(format!("Scanning {} with {} tools...", target, scanners.len()));
    let reports = join_all(scanners.iter().map(|s| run_scan(s.as_ref(), target))).await;
    pb.finish_and_clear();

    let failed = reports.iter().filter(|r| !r.success).count();
    print_reports(&reports, limit, format)?;

    if failed > 0 || skipped > 0 {
        Ok(exit_codes::ERROR)
    } else {
        Ok(exit_codes::SUCCESS)
    }
}

async fn run_scan(scanner: &dyn Scanner, target: &str) -> ScanReport {
    match scanner.scan(target).await {
        Ok(result) => ScanReport::new(scanner.name(), target, result),
        Err(failure) => {
            let message = error_chain(&failure);
            ScanReport::new(scanner.name(), target, failure.result).with_error(message)
        }
    }
}

fn print_reports(reports: &[ScanReport], limit: usize, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(reports),
        OutputFormat::Table => {
            for report in reports {
                print_scan_table(&report.tool, &report.target, &report.result, limit)?;
                if let Some(error) = &report.error {
                    println!();
                    println!("\x1b[31m{} failed: {}\x1b[0m", report.tool, error);
                }
            }
            Ok(())
        }
    }
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'asmscan config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
