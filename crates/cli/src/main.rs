//! ragbasics CLI
//!
//! Main entry point for the ragbasics command-line tool.
//! Builds a local knowledge base from PDFs and web pages and answers
//! questions against it.

mod commands;

use clap::{Parser, Subcommand};
use commands::{CleanCommand, QueryCommand, StatsCommand, VectorizeCommand};
use ragbasics_core::{config::AppConfig, logging, AppResult};
use ragbasics_knowledge::config::DEFAULT_BASE;
use ragbasics_knowledge::EmbeddingEngine;
use std::path::PathBuf;

/// ragbasics - retrieval-augmented question answering over your documents
#[derive(Parser, Debug)]
#[command(name = "ragbasics")]
#[command(about = "Retrieval-augmented question answering over PDFs and web pages", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "RAGBASICS_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "RAGBASICS_CONFIG")]
    config: Option<PathBuf>,

    /// Knowledge base name
    #[arg(short, long, global = true, env = "RAGBASICS_BASE", default_value = DEFAULT_BASE)]
    base: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Generation provider (ollama)
    #[arg(short, long, global = true, env = "RAGBASICS_PROVIDER")]
    provider: Option<String>,

    /// Generation model identifier
    #[arg(short, long, global = true, env = "RAGBASICS_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract, chunk and embed a source into the knowledge base
    Vectorize(VectorizeCommand),

    /// Ask questions answered from the knowledge base
    Query(QueryCommand),

    /// Show knowledge base statistics
    Stats(StatsCommand),

    /// Remove the knowledge base's index and chunks
    Clean(CleanCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from environment
    let config = AppConfig::load()?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("ragbasics starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Base: {}", cli.base);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.ensure_state_dir()?;

    let command_name = match &cli.command {
        Commands::Vectorize(_) => "vectorize",
        Commands::Query(_) => "query",
        Commands::Stats(_) => "stats",
        Commands::Clean(_) => "clean",
    };
    let _span = tracing::info_span!("command", name = command_name, base = %cli.base).entered();

    let result = match cli.command {
        Commands::Vectorize(cmd) => cmd.execute(&config, &cli.base).await,
        Commands::Query(cmd) => cmd.execute(&config, &cli.base).await,
        Commands::Stats(cmd) => cmd.execute(&config, &cli.base).await,
        Commands::Clean(cmd) => cmd.execute(&config, &cli.base).await,
    };

    // Release the embedding model before exit.
    EmbeddingEngine::shutdown();

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
