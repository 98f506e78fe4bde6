//! # Shellrun Configuration System
//!
//! File: cli/src/core/config.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! This module loads, merges and validates shellrun's configuration. Settings
//! control how the process runner behaves: whether launched command lines are
//! echoed, whether the session registry keeps per-command records, which tokens
//! are used for privilege elevation, and how often blocked waits look at their
//! interrupt flag.
//!
//! ## Architecture
//!
//! Configuration sources (in order of precedence):
//! 1. Project-specific `.shellrun.toml` in current directory or ancestors
//! 2. User-specific `config.toml` in the platform config directory
//! 3. Default values defined in the code
//!
//! Each file is read as a partial layer: only the keys it sets override the
//! layers below it.
//!
//! ## Examples
//!
//! ```toml
//! [runner]
//! log_commands = true
//! retain_records = true
//! elevation_prefix = ["sudo", "--"]
//! default_workdir = "~/src"
//! poll_interval_ms = 25
//! ```
//!
//! ```rust,ignore
//! let cfg = config::load_config()?;
//! let session = ShellSession::new(&cfg.runner, tracing_sink());
//! ```
//!
use crate::core::error::{Result, ShellError};
use anyhow::{anyhow, Context};
use directories::ProjectDirs;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

/// Represents the main configuration structure, loaded from TOML files.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// Settings for launching and tracking commands.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    /// Echo each command line as a synthetic `CMD` output line before start.
    #[serde(default)]
    pub log_commands: bool,
    /// Keep a Command Record per submission in the session registry.
    #[serde(default = "default_retain_records")]
    pub retain_records: bool,
    /// Tokens inserted before the command when elevation is requested.
    #[serde(default = "default_elevation_prefix")]
    pub elevation_prefix: Vec<String>,
    /// Working directory used when a command does not name one (can use ~).
    #[serde(default)]
    pub default_workdir: Option<String>,
    /// How often blocked waits re-check their interrupt flag, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            log_commands: false,
            retain_records: default_retain_records(),
            elevation_prefix: default_elevation_prefix(),
            default_workdir: None,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// One configuration file as written. Keys the file leaves out stay `None`
/// so they do not mask a lower layer.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct ConfigLayer {
    #[serde(default)]
    runner: RunnerLayer,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct RunnerLayer {
    log_commands: Option<bool>,
    retain_records: Option<bool>,
    elevation_prefix: Option<Vec<String>>,
    default_workdir: Option<String>,
    poll_interval_ms: Option<u64>,
}

impl RunnerLayer {
    fn apply_to(self, runner: &mut RunnerConfig) {
        if let Some(log_commands) = self.log_commands {
            runner.log_commands = log_commands;
        }
        if let Some(retain_records) = self.retain_records {
            runner.retain_records = retain_records;
        }
        if let Some(prefix) = self.elevation_prefix {
            runner.elevation_prefix = prefix;
        }
        if let Some(dir) = self.default_workdir {
            runner.default_workdir = Some(dir);
        }
        if let Some(poll) = self.poll_interval_ms {
            runner.poll_interval_ms = poll;
        }
    }
}

fn default_retain_records() -> bool {
    true
}
pub fn default_elevation_prefix() -> Vec<String> {
    vec!["su".to_string(), "-c".to_string()]
}
fn default_poll_interval_ms() -> u64 {
    50
}

const PROJECT_CONFIG_FILENAME: &str = ".shellrun.toml";

pub fn load_config() -> Result<Config> {
    let user_config = load_user_config()?;
    let project_config = load_project_config()?;
    let mut merged_config = merge_configs(user_config, project_config);
    expand_config_paths(&mut merged_config).context("Failed to expand paths in configuration")?;
    validate_config(&merged_config).context("Configuration validation failed")?;
    debug!("Final loaded configuration: {:?}", merged_config);
    Ok(merged_config)
}

fn load_user_config() -> Result<Option<ConfigLayer>> {
    if let Some(proj_dirs) = ProjectDirs::from("com", "Shellrun", "shellrun") {
        let config_path = proj_dirs.config_dir().join("config.toml");
        if config_path.exists() {
            info!("Loading user configuration from: {}", config_path.display());
            load_config_from_path(&config_path).map(Some)
        } else {
            debug!(
                "User configuration file not found at {}",
                config_path.display()
            );
            Ok(None)
        }
    } else {
        warn!("Could not determine user config directory.");
        Ok(None)
    }
}

fn load_project_config() -> Result<Option<ConfigLayer>> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    if let Some(project_config_path) = find_project_config_path(&current_dir) {
        info!(
            "Loading project configuration from: {}",
            project_config_path.display()
        );
        load_config_from_path(&project_config_path).map(Some)
    } else {
        debug!("No project configuration file (.shellrun.toml) found in current directory or ancestors.");
        Ok(None)
    }
}

fn find_project_config_path(start: &Path) -> Option<PathBuf> {
    let mut path = start;
    loop {
        let project_config = path.join(PROJECT_CONFIG_FILENAME);
        if project_config.is_file() {
            return Some(project_config);
        }
        if path.join(".git").is_dir() {
            debug!(
                "Found .git directory at {}, stopping project config search.",
                path.display()
            );
            return None;
        }
        path = path.parent()?;
    }
}

fn load_config_from_path(path: &Path) -> Result<ConfigLayer> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML from file: {}", path.display()))
}

/// Applies the layers in order over the built-in defaults. A later layer
/// overrides only the keys it actually sets.
fn merge_configs(user: Option<ConfigLayer>, project: Option<ConfigLayer>) -> Config {
    let mut config = Config::default();
    for layer in [user, project].into_iter().flatten() {
        layer.runner.apply_to(&mut config.runner);
    }
    config
}

fn expand_config_paths(config: &mut Config) -> Result<()> {
    if let Some(dir) = config.runner.default_workdir.as_mut() {
        *dir = shellexpand::tilde(dir.as_str()).into_owned();
        debug!("Expanded default working directory: {}", dir);
    }
    Ok(())
}

fn validate_config(config: &Config) -> Result<()> {
    info!("Validating final configuration...");
    let runner = &config.runner;
    if runner.elevation_prefix.is_empty()
        || runner.elevation_prefix.iter().any(|t| t.trim().is_empty())
    {
        return Err(anyhow!(ShellError::Config(
            "elevation_prefix must contain at least one non-empty token".to_string()
        )));
    }
    if !(1..=1000).contains(&runner.poll_interval_ms) {
        return Err(anyhow!(ShellError::Config(format!(
            "poll_interval_ms must be between 1 and 1000 (got {})",
            runner.poll_interval_ms
        ))));
    }
    // A missing directory is not fatal; the launcher falls back at run time.
    if let Some(dir) = &runner.default_workdir {
        if !Path::new(dir).is_dir() {
            warn!("Configured default_workdir '{}' is not a directory.", dir);
        }
    }
    info!("Configuration validation successful.");
    Ok(())
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_deserialize_basic_toml() {
        let toml_content = r#"
            [runner]
            log_commands = true
            elevation_prefix = ["sudo", "--"]
            default_workdir = "~/src"
        "#;

        let config: Config = toml::from_str(toml_content).expect("Failed to parse TOML");

        assert!(config.runner.log_commands);
        assert!(config.runner.retain_records); // Default
        assert_eq!(config.runner.elevation_prefix, vec!["sudo", "--"]);
        assert_eq!(config.runner.default_workdir.as_deref(), Some("~/src")); // Not yet expanded
        assert_eq!(config.runner.poll_interval_ms, 50);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: std::result::Result<Config, _> = toml::from_str("[runner]\ncolour = true\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.runner.elevation_prefix, vec!["su", "-c"]);
    }

    fn layer(toml_content: &str) -> ConfigLayer {
        toml::from_str(toml_content).expect("Failed to parse layer TOML")
    }

    #[test]
    fn test_merge_prefers_project_overrides() {
        let user = layer("[runner]\npoll_interval_ms = 10\ndefault_workdir = \"/user\"\n");
        let project = layer("[runner]\nretain_records = false\ndefault_workdir = \"/project\"\n");
        let merged = merge_configs(Some(user), Some(project));
        assert!(!merged.runner.retain_records);
        assert_eq!(merged.runner.poll_interval_ms, 10);
        assert_eq!(merged.runner.default_workdir.as_deref(), Some("/project"));
        assert_eq!(merged.runner.elevation_prefix, vec!["su", "-c"]);
    }

    #[test]
    fn test_merge_project_value_equal_to_default_still_wins() {
        let user = layer(
            "[runner]\npoll_interval_ms = 10\nlog_commands = true\nretain_records = false\nelevation_prefix = [\"sudo\"]\n",
        );
        let project = layer(
            "[runner]\npoll_interval_ms = 50\nlog_commands = false\nretain_records = true\nelevation_prefix = [\"su\", \"-c\"]\n",
        );
        let merged = merge_configs(Some(user), Some(project));
        assert_eq!(merged.runner, RunnerConfig::default());
    }

    #[test]
    fn test_merge_without_files_is_default() {
        assert_eq!(merge_configs(None, None), Config::default());
        let user_only = merge_configs(Some(layer("[runner]\nlog_commands = true\n")), None);
        assert!(user_only.runner.log_commands);
    }

    #[test]
    fn test_layer_rejects_unknown_field() {
        let result: std::result::Result<ConfigLayer, _> = toml::from_str("[runner]\ncolour = true\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_path_expansion() {
        let mut config = Config {
            runner: RunnerConfig {
                default_workdir: Some("~/work".into()),
                ..Default::default()
            },
        };
        expand_config_paths(&mut config).unwrap();
        let expanded = config.runner.default_workdir.unwrap();
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("work"));
    }

    #[test]
    fn test_validate_rejects_empty_prefix() {
        let config = Config {
            runner: RunnerConfig {
                elevation_prefix: vec![],
                ..Default::default()
            },
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("elevation_prefix"));
    }

    #[test]
    fn test_validate_rejects_poll_interval_out_of_range() {
        let config = Config {
            runner: RunnerConfig {
                poll_interval_ms: 0,
                ..Default::default()
            },
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_find_project_config_walks_up_to_git_root() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join(".git")).unwrap();
        let nested = root.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_project_config_path(&nested), None);

        fs::write(root.path().join("a").join(PROJECT_CONFIG_FILENAME), "").unwrap();
        assert_eq!(
            find_project_config_path(&nested),
            Some(root.path().join("a").join(PROJECT_CONFIG_FILENAME))
        );
    }
}
