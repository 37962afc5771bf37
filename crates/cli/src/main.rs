//! RMP CLI
//!
//! Main entry point for the `rmp` command-line tool.
//! Serves the streaming professor-recommendation chat over HTTP, or answers a
//! single question from the terminal.

mod commands;
mod server;

use clap::{Parser, Subcommand};
use commands::{AskCommand, ServeCommand};
use rmp_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// RMP - retrieval-augmented chat over professor reviews
#[derive(Parser, Debug)]
#[command(name = "rmp")]
#[command(about = "Retrieval-augmented chat over professor reviews", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file (default: ./rmp.yaml if present)
    #[arg(short, long, global = true, env = "RMP_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Number of reviews retrieved per question
    #[arg(short = 'k', long, global = true)]
    top_k: Option<usize>,

    /// Chat model identifier
    #[arg(short, long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP chat service
    Serve(ServeCommand),

    /// Ask a single question and print the answer
    Ask(AskCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?.with_overrides(
        cli.log_level,
        cli.verbose,
        cli.no_color,
        cli.top_k,
        cli.model,
    );
    if cli.json_logs {
        config.json_logs = true;
    }

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.json_logs)?;

    tracing::info!("RMP CLI starting");
    tracing::debug!("Config file: {:?}", config.config_file);
    tracing::debug!(
        "Providers: embedding={}, index={}, generation={}",
        config.embedding.provider,
        config.index.provider,
        config.generation.provider
    );

    config.validate()?;

    let command_name = match &cli.command {
        Commands::Serve(_) => "serve",
        Commands::Ask(_) => "ask",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Serve(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
