//! Subcommand implementations

pub mod apply;
pub mod validate;

use anyhow::{Context, Result};
use servarr_config::{EnvSecrets, ResolvedConfig, parser, resolver};
use std::path::Path;

/// Parse the configuration file and resolve it against the environment
pub fn load_config(config_path: &Path) -> Result<ResolvedConfig> {
    let config = parser::parse_file(config_path).with_context(|| {
        format!("Failed to load configuration from {}", config_path.display())
    })?;
    resolver::resolve(&config, &EnvSecrets).context("Failed to resolve configuration")
}
