use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use querycost::cost::CostConfig;
use tracing_subscriber::EnvFilter;

mod simulate;

use simulate::{SimulationSummary, Workload};

#[derive(Parser)]
#[command(name = "querycost")]
#[command(author, version, about = "Hierarchical query cost enforcement", long_about = None)]
struct Cli {
    /// TOML file with per-level limits (QUERYCOST__* environment variables override it)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a synthetic concurrent query workload against the configured limits
    Simulate {
        /// Number of concurrent queries
        #[arg(short, long, default_value = "4")]
        queries: usize,

        /// Blocks fetched per query
        #[arg(short, long, default_value = "8")]
        blocks: usize,

        /// Datapoints in every block
        #[arg(short, long, default_value = "100")]
        datapoints_per_block: usize,

        /// Datapoints charged per add
        #[arg(long, default_value = "10")]
        batch: usize,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn load_config(path: Option<&PathBuf>) -> Result<CostConfig> {
    match path {
        Some(path) => CostConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => CostConfig::from_env().context("failed to load config from environment"),
    }
}

fn print_summary(summary: &SimulationSummary) {
    println!("{}", "Query cost simulation".bold());
    println!();
    for query in &summary.queries {
        let status = if query.blocks_rejected == 0 {
            "ok".green()
        } else {
            "limited".yellow()
        };
        println!(
            "  {} [{}] blocks completed: {}, rejected: {}, datapoints read: {}",
            query.query.cyan(),
            status,
            query.blocks_completed,
            query.blocks_rejected,
            query.datapoints_read
        );
        if let Some(err) = &query.first_error {
            println!("    {}", err.red());
        }
    }
    println!();
    for metrics in &summary.metrics {
        println!("{}", metrics.format());
    }
    println!("Global cost after run: {}", summary.global_cost);
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("querycost=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Simulate {
            queries,
            blocks,
            datapoints_per_block,
            batch,
            json,
        } => {
            let governor = config.build()?;
            let workload = Workload {
                queries,
                blocks_per_query: blocks,
                datapoints_per_block,
                batch_size: batch,
            };
            let summary = simulate::run(&governor, &workload).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}
