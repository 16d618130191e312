//! ThreatLens CLI
//!
//! Command-line driver for batch reputation enrichment of fraud events and
//! user-agent strings.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tl_core::{AppConfig, TimeWindow};
use tl_observability::{init_logging_with_config, register_metrics, LoggingConfig};

mod commands;

use commands::{enrich_events, enrich_user_agents, validate, OutputFormat, RunOptions};

#[derive(Parser)]
#[command(name = "threatlens")]
#[command(version)]
#[command(about = "Batch reputation enrichment for fraud event records", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format for logs and the run summary (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    /// Write enriched records to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich events from a JSON-lines export
    Events {
        /// Export file, one `{"body": ..., "event_time": ...}` object per line
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Window start (YYYY-MM-DD or YYYY-MM-DD HH:MM:SS, UTC)
        #[arg(long, requires = "end")]
        start: Option<String>,

        /// Window end, exclusive
        #[arg(long, requires = "start")]
        end: Option<String>,
    },

    /// Enrich a list of user-agent strings, one per line
    UserAgents {
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
    },

    /// Validate configuration and list the providers it enables
    Validate {
        /// Also probe each provider's API with the configured credentials
        #[arg(long)]
        check_health: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    if let Err(e) = init_logging_with_config(LoggingConfig {
        level: log_level,
        json_format: cli.format == OutputFormat::Json,
        ..Default::default()
    }) {
        eprintln!("Failed to initialize logging: {}", e);
    }
    register_metrics();

    let options = RunOptions {
        format: cli.format,
        output: cli.output,
    };

    match cli.command {
        Commands::Events { input, start, end } => {
            let window = match (start, end) {
                (Some(start), Some(end)) => TimeWindow::parse(&start, &end)?,
                _ => TimeWindow::last_day(Utc::now()),
            };
            let config = load_config(&cli.config)?;
            enrich_events(&config, &input, window, &options).await
        }
        Commands::UserAgents { input } => {
            let config = load_config(&cli.config)?;
            enrich_user_agents(&config, &input, &options).await
        }
        Commands::Validate { check_health } => {
            validate(&cli.config, check_health, options.format).await
        }
    }
}

fn load_config(path: &std::path::Path) -> Result<AppConfig> {
    AppConfig::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}
