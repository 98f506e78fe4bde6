//! # Shellrun Main Entry Point
//!
//! File: cli/src/main.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! This file serves as the main entry point for the shellrun CLI application.
//! It handles:
//! - Command-line argument parsing using Clap
//! - Setting up the logging system based on verbosity flags
//! - Routing execution to the command handlers and turning their result into
//!   the process exit status
//!
//! ## Examples
//!
//! ```bash
//! # Get help
//! shellrun --help
//!
//! # Run a command with increased verbosity
//! shellrun -vv run -- ls -la
//! ```
//!
//! Command processing flow:
//! 1. Parse command-line args via Clap
//! 2. Configure logging based on verbosity level
//! 3. Route to the command handler
//! 4. Exit with the handler's status, or 1 after printing an error
//!
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use shellrun::commands;

/// Defines the top-level command-line arguments structure using Clap's derive macros.
#[derive(Parser, Debug)]
#[command(
    name = "shellrun",
    about = "Run external commands concurrently, draining their output safely",
    long_about = "Runs external programs with both output streams drained on dedicated threads.\n\
                  Supports synchronous runs, live asynchronous runs and concurrent batches.",
    propagate_version = true,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

/// Enum defining all available top-level commands.
#[derive(Parser, Debug)]
enum Commands {
    #[command(alias = "r")]
    Run(commands::run::RunArgs),
    #[command(alias = "s")]
    Spawn(commands::spawn::SpawnArgs),
    #[command(alias = "b")]
    Batch(commands::batch::BatchArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    tracing::debug!("Parsed CLI arguments: {:?}", cli);

    let command_result = match cli.command {
        Commands::Run(args) => commands::run::handle_run(args).await,
        Commands::Spawn(args) => commands::spawn::handle_spawn(args).await,
        Commands::Batch(args) => commands::batch::handle_batch(args).await,
    };

    match command_result {
        Ok(0) => Ok(()),
        Ok(code) => {
            tracing::debug!("Exiting with status {}", code);
            std::process::exit(code);
        }
        Err(e) => {
            tracing::error!("Command execution failed: {:?}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
