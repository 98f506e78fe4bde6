//! # Shellrun Spawn Handler
//!
//! File: cli/src/commands/spawn.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! This module implements `shellrun spawn`, the asynchronous execution mode.
//! The launch call returns as soon as the process has started; output lines
//! are printed live by a `ConsoleObserver` and the exit code arrives later
//! through `on_process_complete`, which this handler waits for on a channel.
//!
//! A command that cannot be started makes shellrun exit with 127.
//!
//! ## Usage
//!
//! ```bash
//! # Stream a long build's output as it happens
//! shellrun spawn -- cargo build --release
//!
//! # Echo the command line first, with an extra variable
//! shellrun spawn --echo -e RUST_LOG=debug -- ./server
//! ```
//!
use super::console::{exit_status_for, parse_env_pair, run_interruptible, ConsoleObserver};
use crate::{
    common::process::{
        CommandResult, CommandSpec, ExitCode, Interrupt, NoTaskTracking, ProcessLauncher,
    },
    core::{config, error::Result, logging::tracing_sink},
};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Exit status used when the command could not be started.
const START_FAILED_STATUS: i32 = 127;

/// # Spawn Arguments (`SpawnArgs`)
#[derive(Parser, Debug)]
#[command(
    about = "Start a command in the background and stream its output live",
    long_about = "Starts the command asynchronously. Output is printed as it is read; shellrun exits once the completion report arrives."
)]
pub struct SpawnArgs {
    /// Working directory for the command. Falls back to the current directory if missing.
    #[arg(short = 'C', long = "workdir")]
    workdir: Option<PathBuf>,

    /// Exit code that counts as success.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    expect: i32,

    /// Echo the command line to stderr before starting it.
    #[arg(long)]
    echo: bool,

    /// Extra environment variable for the command (repeatable).
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// The command and its arguments.
    #[arg(required = true, last = true)]
    command: Vec<String>,
}

/// # Handle Spawn Command (`handle_spawn`)
pub async fn handle_spawn(args: SpawnArgs) -> Result<i32> {
    info!("Handling spawn command...");
    debug!("Spawn args: {:?}", args);

    let cfg = config::load_config().context("Failed to load shellrun configuration")?;
    let launcher = ProcessLauncher::new(
        tracing_sink(),
        Duration::from_millis(cfg.runner.poll_interval_ms),
    )
    .with_default_workdir(cfg.runner.default_workdir.as_ref().map(PathBuf::from));

    let interrupt = Interrupt::new();
    let target = args.expect;
    let mut spec = CommandSpec::new(args.command)?
        .with_target_exit_code(target)
        .with_env(args.env)
        .with_interrupt(interrupt.clone());
    if let Some(dir) = args.workdir {
        spec = spec.with_workdir(dir);
    }

    let (tx, rx) = mpsc::channel();
    let observer = Arc::new(
        ConsoleObserver::new(args.echo || cfg.runner.log_commands, true).with_completion(tx),
    );
    if !launcher.run_async(spec, observer, Arc::new(NoTaskTracking)) {
        return Ok(START_FAILED_STATUS);
    }
    debug!("Process started, waiting for completion report");

    let exit_code = match run_interruptible(interrupt, move || rx.recv()).await? {
        Ok(exit_code) => exit_code,
        Err(_) => {
            warn!("Completion report never arrived");
            ExitCode::Interrupted
        }
    };
    let result = CommandResult::completed(target, exit_code, Vec::new(), Vec::new());
    info!("Spawned command finished with {}", exit_code);
    Ok(exit_status_for(&result))
}
