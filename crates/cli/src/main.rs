//! Piffy CLI - Database migrations and demo data.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! piffy-cli migrate
//!
//! # Seed the built-in demo catalog
//! piffy-cli seed
//!
//! # Seed a catalog from a YAML file
//! piffy-cli seed --file catalog.yaml
//! ```
//!
//! # Commands
//!
//! - `migrate` - Apply the shop schema migrations
//! - `seed` - Insert demo categories, products and variants

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "piffy-cli")]
#[command(author, version, about = "Piffy Studio CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the catalog with demo data
    Seed {
        /// YAML catalog to load instead of the built-in demo catalog
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file } => commands::seed::catalog(file.as_deref()).await?,
    }
    Ok(())
}
