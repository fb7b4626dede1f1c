//! `solkit config`: inspect and edit the global configuration.
//!
//! ```bash
//! solkit config init
//! solkit config add-portal staging https://staging/portal/sharing/rest publisher
//! solkit config show
//! ```

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::config::{GlobalConfig, PortalConfig};

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: Option<ConfigSubcommands>,
}

#[derive(Subcommand)]
enum ConfigSubcommands {
    /// Write an example configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the configuration with tokens hidden
    Show,

    /// Print where the configuration file lives
    Path,

    /// Add or replace a portal
    AddPortal {
        name: String,
        url: String,
        username: String,
        /// Access token (otherwise `SOLKIT_TOKEN` is used at run time)
        #[arg(long)]
        token: Option<String>,
        /// Make this the default portal
        #[arg(long)]
        default: bool,
    },

    /// Remove a portal
    RemovePortal { name: String },
}

impl ConfigCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let path = match config_path {
            Some(path) => path,
            None => GlobalConfig::default_path()?,
        };

        match self.command {
            Some(ConfigSubcommands::Init {
                force,
            }) => Self::init(&path, force).await,
            Some(ConfigSubcommands::Show) | None => Self::show(&path).await,
            Some(ConfigSubcommands::Path) => {
                println!("{}", path.display());
                Ok(())
            }
            Some(ConfigSubcommands::AddPortal {
                name,
                url,
                username,
                token,
                default,
            }) => {
                let mut config = GlobalConfig::load_with_optional(Some(path.clone())).await?;
                config.add_portal(
                    name.clone(),
                    PortalConfig {
                        url,
                        username,
                        token,
                    },
                );
                if default {
                    config.default_portal = Some(name.clone());
                }
                config.save_to(&path).await?;
                println!("{} Added portal '{name}'", "✓".green());
                Ok(())
            }
            Some(ConfigSubcommands::RemovePortal {
                name,
            }) => {
                let mut config = GlobalConfig::load_with_optional(Some(path.clone())).await?;
                if config.remove_portal(&name) {
                    config.save_to(&path).await?;
                    println!("{} Removed portal '{name}'", "✓".green());
                } else {
                    println!("{} Portal '{name}' is not configured", "!".yellow());
                }
                Ok(())
            }
        }
    }

    async fn init(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            println!("{} Global config already exists at: {}", "✗".red(), path.display());
            println!("   Use --force to overwrite");
            return Ok(());
        }

        let config = GlobalConfig::init_example();
        config.save_to(path).await?;

        println!("{} Created global config at: {}", "✓".green(), path.display());
        println!("\n{}", "Next steps:".yellow());
        println!("  1. Point the 'prod' portal at your portal's REST endpoint");
        println!("  2. Replace 'YOUR_TOKEN' with an access token, or set SOLKIT_TOKEN");
        Ok(())
    }

    async fn show(path: &Path) -> Result<()> {
        let config = GlobalConfig::load_with_optional(Some(path.to_path_buf())).await?;

        println!("{}", "Global Configuration".bold());
        println!("Location: {}\n", path.display());

        if config.portals.is_empty() {
            println!("No portals configured.");
            println!("\n{}", "Tip:".yellow());
            println!("  Run 'solkit config init' to create an example configuration");
        } else {
            println!("{}", toml::to_string_pretty(&redacted(config))?);
        }
        Ok(())
    }
}

fn redacted(mut config: GlobalConfig) -> GlobalConfig {
    for portal in config.portals.values_mut() {
        if portal.token.is_some() {
            portal.token = Some("***".to_string());
        }
    }
    config
}
