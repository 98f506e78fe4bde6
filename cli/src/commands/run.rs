//! # Shellrun Run Handler
//!
//! File: cli/src/commands/run.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! This module implements `shellrun run`, which executes one command in
//! synchronous mode through a `ShellSession` and reports the captured result
//! once the process has terminated and both output streams have drained.
//!
//! ## Architecture
//!
//! 1. Parse `RunArgs` with `clap`.
//! 2. Load the configuration (`core::config`) for runner settings.
//! 3. Build a `CommandSpec` (working directory, expected exit code,
//!    environment, interrupt handle).
//! 4. Submit it to a fresh `ShellSession` on the blocking pool; Ctrl-C raises
//!    the interrupt.
//! 5. Replay the captured lines (or print JSON) and map the result to
//!    shellrun's own exit status.
//!
//! ## Usage
//!
//! ```bash
//! # Run a command, replaying its output afterwards
//! shellrun run -- ls -la
//!
//! # Treat exit code 1 as success and run from another directory
//! shellrun run --expect 1 -C /src/project -- grep -q TODO README.md
//!
//! # Run through the elevation prefix with an extra environment variable
//! shellrun run --su -e LANG=C -- id -u
//!
//! # Machine-readable output
//! shellrun run --json -- uname -a
//! ```
//!
use super::console::{exit_status_for, parse_env_pair, run_interruptible, ConsoleObserver};
use crate::{
    common::process::{CommandResult, CommandSpec, Interrupt, ShellSession},
    core::{config, error::Result, logging::tracing_sink},
};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// # Run Arguments (`RunArgs`)
#[derive(Parser, Debug)]
#[command(
    about = "Run a command to completion and report its captured output",
    long_about = "Runs the command synchronously, draining stdout and stderr, then prints the captured lines and exits with a status derived from the command's exit code."
)]
pub struct RunArgs {
    /// Working directory for the command. Falls back to the current directory if missing.
    #[arg(short = 'C', long = "workdir")]
    workdir: Option<PathBuf>,

    /// Exit code that counts as success.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    expect: i32,

    /// Run through the configured elevation prefix (default `su -c`).
    #[arg(long)]
    su: bool,

    /// Echo the command line to stderr before starting it.
    #[arg(long)]
    echo: bool,

    /// Extra environment variable for the command (repeatable).
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// Print the result as JSON instead of replaying the output.
    #[arg(long)]
    json: bool,

    /// The command and its arguments.
    #[arg(required = true, last = true)]
    command: Vec<String>,
}

/// # Handle Run Command (`handle_run`)
///
/// Returns the exit status shellrun itself should exit with.
pub async fn handle_run(args: RunArgs) -> Result<i32> {
    info!("Handling run command...");
    debug!("Run args: {:?}", args);

    let cfg = config::load_config().context("Failed to load shellrun configuration")?;
    let interrupt = Interrupt::new();
    let mut spec = CommandSpec::new(args.command)?
        .with_target_exit_code(args.expect)
        .with_env(args.env)
        .with_interrupt(interrupt.clone());
    if let Some(dir) = args.workdir {
        spec = spec.with_workdir(dir);
    }

    let session = Arc::new(ShellSession::new(&cfg.runner, tracing_sink()));
    let observer = Arc::new(ConsoleObserver::new(
        args.echo || cfg.runner.log_commands,
        false,
    ));
    let elevate = args.su;
    let worker = Arc::clone(&session);
    let result =
        run_interruptible(interrupt, move || worker.submit_with(spec, elevate, observer)).await??;
    session.dispose()?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to render result as JSON")?
        );
    } else {
        replay(&result);
    }
    if result.is_failed() {
        warn!(
            "Command did not reach exit code {} (got {:?})",
            result.target_exit_code(),
            result.exit_code()
        );
    }
    info!(
        "Command finished with {:?} after {:?}",
        result.exit_code(),
        result.elapsed()
    );
    Ok(exit_status_for(&result))
}

fn replay(result: &CommandResult) {
    for line in result.stdout_lines() {
        println!("{}", line);
    }
    for line in result.stderr_lines() {
        eprintln!("{}", line);
    }
}
