use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod client;
mod commands;
mod config;

#[derive(Parser)]
#[command(
    name = "dockmon",
    about = "dockmon — inspect the health and restarts of monitored services",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Client config file (default: ~/.dockmon/config.json)
    #[arg(long, global = true, env = "DOCKMON_CLI_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the API host and credentials after verifying them
    Configure,
    /// List monitored services and their status
    GetServices,
    /// Describe one monitored service
    GetService {
        /// Service name as configured in dockmond
        name: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dockmon=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => config::CliConfig::default_path()?,
    };

    match cli.command {
        Commands::Configure => commands::configure::configure(&config_path),
        Commands::GetServices => commands::services::get_services(&config_path),
        Commands::GetService { name } => commands::services::get_service(&config_path, &name),
    }
}
