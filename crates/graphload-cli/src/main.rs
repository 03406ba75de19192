mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "graphload",
    version,
    about = "Bulk CSV-to-graph import with adaptive sizing and bounded retries"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full import
    Run {
        /// Path to load-config YAML file
        config: PathBuf,
        /// Import into an in-memory store instead of the configured one
        #[arg(long)]
        dry_run: bool,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate configuration and store connectivity
    Check {
        /// Path to load-config YAML file
        config: PathBuf,
    },
    /// Scan the batch files and report the estimated workload
    Estimate {
        /// Path to load-config YAML file
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Run { config, dry_run, json } => {
            commands::run::execute(&config, dry_run, json).await
        }
        Commands::Check { config } => commands::check::execute(&config).await,
        Commands::Estimate { config } => commands::estimate::execute(&config).await,
    }
}
