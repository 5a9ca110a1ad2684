use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use depsentry::{
    config::Config,
    discovery::{all_strategies, get_strategy, DiscoveryStrategy, StrategyKind},
    model::{AnalysisReport, Severity},
    output::{format_report_to_string, print_report, OutputFormat},
    provider::ProviderKind,
    Analyzer,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const CRITICAL_VULN: u8 = 2;
    pub const HIGH_VULN: u8 = 3;
    pub const MEDIUM_VULN: u8 = 4;
    pub const LOW_VULN: u8 = 5;
    pub const ERROR: u8 = 1;
}

#[derive(Parser)]
#[command(name = "depsentry")]
#[command(
    author,
    version,
    about = "Check a project's npm dependencies against several vulnerability databases"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find a project's dependencies and look them up
    Analyze {
        /// Project root directory
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Path hint passed to discovery (e.g. a lockfile)
        #[arg(long)]
        hint: Option<String>,

        /// Discovery strategies to try, in order (node-modules, package-lock)
        #[arg(short, long = "strategy")]
        strategies: Vec<String>,

        /// Output format (table, json)
        #[arg(short, long)]
        format: Option<String>,

        /// Write output to file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Exit with error if vulnerabilities at or above this severity are found
        #[arg(long, value_enum)]
        fail_on: Option<FailLevel>,

        /// Use this config file instead of the default location
        #[arg(long)]
        config: Option<PathBuf>,

        /// Log progress of discovery and lookups
        #[arg(short, long)]
        verbose: bool,
    },

    /// List available vulnerability providers
    Providers,

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

#[derive(Clone, Copy, ValueEnum)]
enum FailLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl FailLevel {
    fn threshold(self) -> Severity {
        match self {
            FailLevel::Critical => Severity::Critical,
            FailLevel::High => Severity::High,
            FailLevel::Medium => Severity::Medium,
            FailLevel::Low => Severity::Low,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

async fn run() -> Result<u8> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            path,
            hint,
            strategies,
            format,
            output,
            fail_on,
            config,
            verbose,
        } => {
            init_logging(verbose);

            let config = match config {
                Some(path) => Config::load_from(&path)?,
                None => Config::load()?,
            };

            run_analyze(
                &config,
                path,
                hint.unwrap_or_default(),
                &strategies,
                format,
                output,
                fail_on,
            )
            .await
        }
        Commands::Providers => {
            list_providers();
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run_analyze(
    config: &Config,
    project: PathBuf,
    hint: String,
    strategy_names: &[String],
    format: Option<String>,
    output_file: Option<PathBuf>,
    fail_on: Option<FailLevel>,
) -> Result<u8> {
    let format_str = format.unwrap_or_else(|| config.default_format.clone());
    let format = OutputFormat::from_str(&format_str).map_err(|e| anyhow::anyhow!(e))?;
    let is_interactive = format == OutputFormat::Table;

    let strategies: Vec<Box<dyn DiscoveryStrategy>> = if strategy_names.is_empty() {
        all_strategies()
    } else {
        strategy_names
            .iter()
            .map(|name| StrategyKind::from_str(name).map(get_strategy))
            .collect::<depsentry::Result<_>>()?
    };

    let analyzer = Analyzer::from_config(config)?;

    let progress = if is_interactive {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Analyzing {}...", project.display()));
        Some(pb)
    } else {
        None
    };

    let result = analyzer
        .analyze_with_report(&project, &hint, &strategies)
        .await;

    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }

    let mut report =
        result.with_context(|| format!("analysis of {} failed", project.display()))?;

    let ignored = config.ignore.filter_report(&mut report);
    if ignored > 0 {
        warn!(ignored, "findings suppressed by ignore rules");
    }

    if let Some(path) = output_file {
        std::fs::write(&path, format_report_to_string(&report)?)
            .with_context(|| format!("cannot write {}", path.display()))?;
        if is_interactive {
            println!("Results written to: {}", path.display());
        }
    } else {
        print_report(&report, format)?;
    }

    Ok(determine_exit_code(&report, fail_on))
}

/// Determine the exit code based on vulnerabilities found and --fail-on setting
fn determine_exit_code(report: &AnalysisReport, fail_on: Option<FailLevel>) -> u8 {
    let Some(fail_on) = fail_on else {
        return exit_codes::SUCCESS;
    };

    match report.highest_severity() {
        Some(highest) if highest >= fail_on.threshold() => match highest {
            Severity::Critical => exit_codes::CRITICAL_VULN,
            Severity::High => exit_codes::HIGH_VULN,
            Severity::Medium => exit_codes::MEDIUM_VULN,
            Severity::Low => exit_codes::LOW_VULN,
            Severity::Unknown => exit_codes::SUCCESS,
        },
        _ => exit_codes::SUCCESS,
    }
}

fn list_providers() {
    let config = Config::load().unwrap_or_default();

    println!("Available providers:");
    println!();

    for kind in ProviderKind::ALL {
        let enabled = if config.providers.contains(&kind) {
            "yes"
        } else {
            "no"
        };
        println!(
            "  {:<10} {:<18} [enabled: {}]",
            kind.as_str(),
            kind.display_name(),
            enabled
        );
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
        println!("Run 'depsentry config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
