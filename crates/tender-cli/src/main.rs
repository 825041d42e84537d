//! Tender CLI tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "tender")]
#[command(about = "Tender job auction CLI", long_about = None)]
struct Cli {
    /// Registry configuration file
    #[arg(long, short, env = "TENDER_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a registry configuration file
    Validate {
        /// Path to the configuration file
        #[arg(default_value = "tender.kdl")]
        path: PathBuf,
    },
    /// Run an auction between in-process agents on a private store
    Simulate {
        /// Number of bidding agents
        #[arg(long, default_value = "3")]
        agents: usize,
        /// Number of offers to publish
        #[arg(long, default_value = "5")]
        jobs: usize,
        /// Give up after this many seconds
        #[arg(long, default_value = "10")]
        timeout: u64,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Validate { path } => {
            commands::validate(&path)?;
        }
        Commands::Simulate {
            agents,
            jobs,
            timeout,
        } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::simulate::run(&config, agents, jobs, timeout).await?;
        }
    }

    Ok(())
}
