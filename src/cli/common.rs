//! Helpers shared by several commands.

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::path::Path;

use crate::config::GlobalConfig;
use crate::portal::PortalClient;
use crate::solution::Solution;

/// Output format for commands that print data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human readable tree
    #[default]
    Tree,
    /// Pretty JSON
    Json,
    /// Plain indented text
    Text,
}

/// Load a solution file, attaching the path to any error.
pub fn load_solution(path: &Path) -> Result<Solution> {
    Solution::load(path).with_context(|| format!("Failed to load solution {}", path.display()))
}

/// Client for the named (or default) portal.
pub fn portal_client(config: &GlobalConfig, name: Option<&str>) -> Result<PortalClient> {
    let (name, portal) = config.portal(name)?;
    tracing::debug!("Using portal '{}' at {}", name, portal.url);
    if portal.resolve_token().is_none() {
        tracing::warn!("Portal '{}' has no token; requests are anonymous", name);
    }
    PortalClient::from_config(portal, config)
}
