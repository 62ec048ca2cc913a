//! Metrics Watchdog CLI
//!
//! A command-line tool for checking watchdog health and inspecting or
//! clearing alert cooldown state.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{state, status};

/// Metrics Watchdog CLI
#[derive(Parser)]
#[command(name = "mwd")]
#[command(author, version, about = "CLI for the Metrics Watchdog agent", long_about = None)]
pub struct Cli {
    /// Agent API URL (can also be set via MWD_API_URL env var)
    #[arg(long, env = "MWD_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show agent health and readiness
    Status,

    /// Inspect or clear alert cooldown state
    #[command(subcommand)]
    State(StateCommands),
}

#[derive(Subcommand)]
pub enum StateCommands {
    /// List recorded alert state for every anomaly type
    List,

    /// Clear all alert state so the next pass re-alerts
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize client
    let client = client::ApiClient::new(&cli.api_url)?;

    // Execute command
    match cli.command {
        Commands::Status => {
            status::show_status(&client, cli.format).await?;
        }
        Commands::State(state_cmd) => match state_cmd {
            StateCommands::List => {
                state::list_state(&client, cli.format).await?;
            }
            StateCommands::Clear { yes } => {
                state::clear_state(&client, yes, cli.format).await?;
            }
        },
    }

    Ok(())
}
