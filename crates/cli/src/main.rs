//! Verso CLI
//!
//! Main entry point for the verso command-line tool.
//! Manages versioned prompt templates, their labels, and compilation.

mod commands;

use clap::{Parser, Subcommand};
use commands::{CompileCommand, LabelCommand, PromptCommand, VersionCommand};
use std::path::PathBuf;
use uuid::Uuid;
use verso_core::{config::AppConfig, logging, AppResult};

/// Verso - versioned prompt templates with labels and compilation
#[derive(Parser, Debug)]
#[command(name = "verso")]
#[command(about = "Versioned prompt templates with labels and compilation", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "VERSO_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "VERSO_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the SQLite database
    #[arg(long, global = true, env = "VERSO_DATABASE")]
    database: Option<PathBuf>,

    /// Project UUID the command operates on
    #[arg(short, long, global = true, env = "VERSO_PROJECT")]
    project: Option<Uuid>,

    /// Acting user UUID recorded on changes
    #[arg(short, long, global = true, env = "VERSO_ACTOR")]
    actor: Option<Uuid>,

    /// Act as the system user (nil UUID)
    #[arg(long, global = true, conflicts_with = "actor")]
    system: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create, inspect, list, update and delete prompts
    Prompt(PromptCommand),

    /// Append and inspect prompt versions
    Version(VersionCommand),

    /// Point labels at versions
    Label(LabelCommand),

    /// Substitute variables into a prompt version
    Compile(CompileCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from environment and the default config file
    let mut config = AppConfig::load()?;
    if let Some(ref path) = cli.config {
        config = config.merge_yaml(path)?;
    }

    let actor = if cli.system { Some(Uuid::nil()) } else { cli.actor };

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.database,
        cli.project,
        actor,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );
    config.validate()?;

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Verso CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Database: {:?}", config.database_path());

    // Ensure .verso directory exists
    config.ensure_verso_dir()?;

    let command_name = match &cli.command {
        Commands::Prompt(_) => "prompt",
        Commands::Version(_) => "version",
        Commands::Label(_) => "label",
        Commands::Compile(_) => "compile",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Prompt(cmd) => cmd.execute(&config).await,
        Commands::Version(cmd) => cmd.execute(&config).await,
        Commands::Label(cmd) => cmd.execute(&config).await,
        Commands::Compile(cmd) => cmd.execute(&config).await,
    };

    // Log completion
    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
