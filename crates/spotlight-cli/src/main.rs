//! Spotlight CLI - Run metadata queries from the command line

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::{completions, config as config_cmd, search};

#[derive(Parser)]
#[command(name = "spotlight")]
#[command(author, version, about = "Asynchronous metadata index queries")]
pub struct Cli {
    /// Output format: table, json, csv (defaults to the config file)
    #[arg(short, long, global = true)]
    pub format: Option<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a query and print one attribute per result
    Search(search::SearchArgs),
    /// Manage CLI configuration
    Config(config_cmd::ConfigArgs),
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    tracing::debug!("Starting spotlight CLI");

    match &cli.command {
        Commands::Search(args) => search::run(args, &cli).await?,
        Commands::Config(args) => config_cmd::run(args).await?,
        Commands::Completions(args) => completions::run(args)?,
    }

    Ok(())
}
