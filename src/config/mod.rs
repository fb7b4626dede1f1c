//! Configuration management for solkit
//!
//! solkit has a single, user-wide configuration file. It is never part of a
//! captured solution, so it is the place for portal credentials.
//!
//! # Modules
//!
//! - `global` - loading, saving and querying [`GlobalConfig`]
//!
//! # Location
//!
//! - Unix/macOS: `~/.solkit/config.toml`
//! - Windows: `%LOCALAPPDATA%\solkit\config.toml`
//! - Override: `SOLKIT_CONFIG=/path/to/config.toml` or `--config <path>`
//!
//! A missing file is not an error; defaults are used.

mod global;

pub use global::{GlobalConfig, PortalConfig};
