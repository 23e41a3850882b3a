//! Parley Command-Line Interface
//!
//! Offline utilities around the Parley session layer: compute and verify
//! identities, validate bootstrap node lists and inspect configuration.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

/// Parley - session layer tools for a peer-to-peer messenger
#[derive(Parser)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: String,

    /// Override the snapshot path
    #[arg(long)]
    save_path: Option<String>,

    /// Override the bootstrap node list path
    #[arg(long)]
    nodes: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a full identity from a public key and nospam
    Address {
        /// Public key, 64 hex characters
        public_key: String,

        /// Anti-spam value, 8 hex characters
        #[arg(short, long, default_value = "00000000")]
        nospam: String,
    },

    /// Check an identity string and show its parts
    Verify {
        /// Identity, 76 hex characters
        address: String,
    },

    /// Validate a bootstrap node list
    Nodes {
        /// Node list file (defaults to the configured one)
        file: Option<String>,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut session_config = config::load(&cli.config)?;
    if let Some(path) = &cli.save_path {
        session_config.save_path = Some(config::expand(path));
    }
    if let Some(path) = &cli.nodes {
        session_config.nodes_path = Some(config::expand(path));
    }

    match cli.command.unwrap_or(Commands::Config) {
        Commands::Address { public_key, nospam } => {
            commands::address(&public_key, &nospam)?;
        }
        Commands::Verify { address } => {
            commands::verify(&address)?;
        }
        Commands::Nodes { file } => {
            let path = match file {
                Some(file) => Some(config::expand(&file)),
                None => session_config.nodes_path.clone(),
            };
            commands::nodes(path).await?;
        }
        Commands::Config => {
            commands::show_config(&session_config)?;
        }
    }

    Ok(())
}
