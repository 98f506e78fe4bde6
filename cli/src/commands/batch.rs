//! # Shellrun Batch Handler
//!
//! File: cli/src/commands/batch.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! This module implements `shellrun batch`, which runs every command listed in
//! a file concurrently through one `ShellSession`, then prints the session's
//! snapshot ordered by command id and disposes the session.
//!
//! ## Batch file format
//!
//! - One command per line, tokens separated by whitespace (no quoting).
//! - Blank lines and lines starting with `#` are ignored.
//! - A line starting with `!` is run through the elevation prefix.
//!
//! ```text
//! # warm-up
//! uname -a
//! df -h /
//! ! apt-get update
//! ```
//!
//! shellrun exits with 0 if every command succeeded and 1 otherwise.
//!
use super::console::run_interruptible;
use crate::{
    common::process::{
        CommandRecord, CommandSpec, Interrupt, RecordStatus, ShellSession, SilentObserver,
    },
    core::{
        config::{self, RunnerConfig},
        error::{Result, ShellError},
        logging::tracing_sink,
    },
};
use anyhow::{anyhow, Context};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::{fs, thread};
use tracing::{debug, info};

/// # Batch Arguments (`BatchArgs`)
#[derive(Parser, Debug)]
#[command(about = "Run every command in a file concurrently and summarise the results")]
pub struct BatchArgs {
    /// Run every command through the elevation prefix.
    #[arg(long)]
    su: bool,

    /// Print the records as JSON instead of a table.
    #[arg(long)]
    json: bool,

    /// File with one command per line.
    file: PathBuf,
}

/// One parsed line of a batch file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BatchEntry {
    argv: Vec<String>,
    elevate: bool,
}

/// # Handle Batch Command (`handle_batch`)
pub async fn handle_batch(args: BatchArgs) -> Result<i32> {
    info!("Handling batch command...");
    debug!("Batch args: {:?}", args);

    let content = fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read batch file {}", args.file.display()))?;
    let entries = parse_batch(&content)?;
    if entries.is_empty() {
        anyhow::bail!(ShellError::BatchFile(format!(
            "{} contains no commands",
            args.file.display()
        )));
    }

    let cfg = config::load_config().context("Failed to load shellrun configuration")?;
    // The summary is built from the records, so they must be kept.
    let runner = RunnerConfig {
        retain_records: true,
        ..cfg.runner
    };
    let session = Arc::new(ShellSession::new(&runner, tracing_sink()));
    let interrupt = Interrupt::new();

    let worker = Arc::clone(&session);
    let worker_interrupt = interrupt.clone();
    let elevate_all = args.su;
    run_interruptible(interrupt, move || {
        submit_all(&worker, entries, elevate_all, &worker_interrupt)
    })
    .await??;

    let records: Vec<CommandRecord> = session.snapshot()?.into_values().collect();
    session.dispose()?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&records).context("Failed to render records as JSON")?
        );
    } else {
        print_table(&records);
    }

    let all_succeeded = records
        .iter()
        .all(|r| r.status() == RecordStatus::Succeeded);
    Ok(if all_succeeded { 0 } else { 1 })
}

fn parse_batch(content: &str) -> Result<Vec<BatchEntry>> {
    let mut entries = Vec::new();
    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (elevate, rest) = match line.strip_prefix('!') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, line),
        };
        let argv: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
        if argv.is_empty() {
            anyhow::bail!(ShellError::BatchFile(format!(
                "line {}: '!' must be followed by a command",
                index + 1
            )));
        }
        entries.push(BatchEntry { argv, elevate });
    }
    Ok(entries)
}

/// Submits every entry on its own thread and waits for all of them.
fn submit_all(
    session: &ShellSession,
    entries: Vec<BatchEntry>,
    elevate_all: bool,
    interrupt: &Interrupt,
) -> Result<()> {
    thread::scope(|scope| {
        let handles: Vec<_> = entries
            .into_iter()
            .map(|entry| {
                scope.spawn(move || {
                    let spec = CommandSpec::new(entry.argv)?.with_interrupt(interrupt.clone());
                    session.submit_with(
                        spec,
                        entry.elevate || elevate_all,
                        Arc::new(SilentObserver::default()),
                    )
                })
            })
            .collect();
        for handle in handles {
            handle
                .join()
                .map_err(|_| anyhow!("Batch worker thread panicked"))??;
        }
        Ok(())
    })
}

fn print_table(records: &[CommandRecord]) {
    println!("{:>4}  {:<9}  {:>11}  COMMAND", "ID", "STATUS", "EXIT");
    for record in records {
        let status = match record.status() {
            RecordStatus::Running => "running",
            RecordStatus::Succeeded => "ok",
            RecordStatus::Failed => "failed",
        };
        let exit = record
            .result
            .as_ref()
            .and_then(|r| r.exit_code())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>4}  {:<9}  {:>11}  {}",
            record.id,
            status,
            exit,
            record.command.join(" ")
        );
    }
}
