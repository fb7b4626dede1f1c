//! Command-line interface for solkit.
//!
//! Each subcommand lives in its own module and exposes an `execute` method.
//! Global flags are collected into a [`CliConfig`] once and handed to the
//! commands that need them; nothing is written back into the process
//! environment.
//!
//! # Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `capture` | Fetch items and their dependencies into a solution file |
//! | `order` | Print the build order of a solution |
//! | `tree` | Print the dependency hierarchy of a solution |
//! | `validate` | Check a solution for cycles and dangling references |
//! | `deploy` | Create a solution's items in a portal |
//! | `config` | Show or edit the global configuration |
//!
//! # Global options
//!
//! - `--verbose` / `--quiet`: log level (`debug` / off, default `info`)
//! - `--no-progress`: hide progress bars (same as `SOLKIT_NO_PROGRESS`)
//! - `--config <path>`: global config file (same as `SOLKIT_CONFIG`)

mod capture;
mod common;
mod config;
mod deploy;
mod order;
mod tree;
mod validate;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::GlobalConfig;
use crate::constants::CONFIG_PATH_ENV;

/// Settings derived from the global flags.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log filter; `None` disables logging
    pub log_level: Option<String>,
    /// Hide progress bars
    pub no_progress: bool,
    /// Explicit global config path
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the tracing subscriber.
    ///
    /// `RUST_LOG` wins over the level chosen by the flags.
    pub fn init_logging(&self) {
        let Some(level) = &self.log_level else {
            return;
        };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("solkit_cli={level},warn")));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    /// Load the global configuration this invocation should use.
    pub async fn load_global_config(&self) -> Result<GlobalConfig> {
        GlobalConfig::load_with_optional(self.config_path.clone()).await
    }
}

/// Capture portal content as reusable solutions and redeploy it in
/// dependency order.
#[derive(Parser)]
#[command(
    name = "solkit",
    about = "Capture portal content as templates and redeploy it in dependency order",
    version,
    author
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Path to the global config file
    #[arg(short, long, global = true, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Disable progress bars
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture items and their dependencies into a solution file
    Capture(capture::CaptureCommand),

    /// Print the build order of a solution
    Order(order::OrderCommand),

    /// Print the dependency hierarchy of a solution
    Tree(tree::TreeCommand),

    /// Check a solution for problems before deploying it
    Validate(validate::ValidateCommand),

    /// Create a solution's items in a portal
    Deploy(deploy::DeployCommand),

    /// Show or edit the global configuration
    Config(config::ConfigCommand),
}

impl Cli {
    /// Run the selected command.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        config.init_logging();
        self.execute_with_config(config).await
    }

    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("info".to_string())
        };

        CliConfig {
            log_level,
            no_progress: self.no_progress || crate::utils::is_progress_disabled(),
            config_path: self.config.clone(),
        }
    }

    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        match self.command {
            Commands::Capture(cmd) => cmd.execute(&config).await,
            Commands::Order(cmd) => cmd.execute(),
            Commands::Tree(cmd) => cmd.execute(),
            Commands::Validate(cmd) => cmd.execute(),
            Commands::Deploy(cmd) => cmd.execute(&config).await,
            Commands::Config(cmd) => cmd.execute(config.config_path).await,
        }
    }
}
