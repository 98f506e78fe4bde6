//! # Shellrun Core Infrastructure
//!
//! File: cli/src/core/mod.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! This module aggregates the infrastructure shared by the process runner and
//! the subcommands:
//! - `config`: Configuration loading, merging, and validation
//! - `error`: Error types and the crate-wide `Result` alias
//! - `logging`: The injected `LogSink` capability and its implementations
//!
pub mod config;
pub mod error;
pub mod logging;
