//! CLI Module
//!
//! Command-line interface for Courier Relay using Clap v4.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Courier Relay - Real-Time Courier Dispatch Notifier
#[derive(Parser, Debug)]
#[command(name = "courier-relay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug mode (creates log files in .courier-relay/logs/)
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the WebSocket/HTTP gateway (default)
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the configured bind address
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Initialize configuration
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration
    Config,

    /// List jobs from the configured seed file
    Jobs,
}

/// Main CLI entry point
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.debug {
        tracing::info!("Debug mode enabled");
    }

    // Load configuration
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        None | Some(Commands::Serve { .. }) => {
            let (port, bind) = match &cli.command {
                Some(Commands::Serve { port, bind }) => (*port, bind.clone()),
                _ => (None, None),
            };
            commands::cmd_serve(config, port, bind).await
        }
        Some(Commands::Init { force }) => commands::cmd_init(force),
        Some(Commands::Config) => commands::cmd_config(&config),
        Some(Commands::Jobs) => commands::cmd_jobs(&config).await,
    }
}
