//! Courier CLI
//!
//! Runs the notification router against in-memory stores seeded from JSON
//! files, for inspecting configuration and trying out routing decisions.

mod app;
mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Courier CLI: inspect configuration and dry-run notification routing.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(
        long,
        env = "COURIER_CONFIG",
        default_value = "courier.toml",
        global = true
    )]
    config: PathBuf,

    /// Output format.
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show an entity's effective configuration.
    Resolve(commands::resolve::ResolveArgs),
    /// Route an event and print the messages it produces.
    Route(commands::route::RouteArgs),
    /// Classify a provider status the way delivery jobs would.
    Classify(commands::classify::ClassifyArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::Classify(args) => commands::classify::run(args, &cli.format),
        Command::Resolve(args) => {
            let dispatcher = app::load(&cli.config).await?;
            let result = commands::resolve::run(&dispatcher, args, &cli.format).await;
            dispatcher.shutdown().await;
            result
        }
        Command::Route(args) => {
            let dispatcher = app::load(&cli.config).await?;
            let result = commands::route::run(&dispatcher, args, &cli.format).await;
            dispatcher.shutdown().await;
            result
        }
    }
}
