//! Configuration file parser and structural validation

use crate::{Config, ConfigError, InstanceKind, Result};
use std::path::Path;

/// Parse a YAML configuration file
pub fn parse_file(path: impl AsRef<Path>) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_str(&content)
}

/// Parse YAML configuration from a string
pub fn parse_str(content: &str) -> Result<Config> {
    let config: Config = serde_yaml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    for (name, instance) in &config.instances {
        if !instance.app_path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "Instance '{}' app_path must start with '/', got '{}'",
                name, instance.app_path
            )));
        }

        // Arr instances need a root folder and a download category
        if matches!(instance.kind, InstanceKind::Sonarr | InstanceKind::Radarr) {
            if instance.root_folder.is_none() {
                return Err(ConfigError::ValidationError(format!(
                    "Instance '{}' requires a root_folder",
                    name
                )));
            }
            if instance.category.is_none() {
                return Err(ConfigError::ValidationError(format!(
                    "Instance '{}' requires a category",
                    name
                )));
            }
        }

        // Categories referenced by instances must be declared on the client
        if let Some(category) = &instance.category {
            if !config.qbittorrent.categories.contains_key(category) {
                return Err(ConfigError::ValidationError(format!(
                    "Instance '{}' references undeclared category '{}'",
                    name, category
                )));
            }
        }
    }

    if !config.qbittorrent.app_path.starts_with('/') {
        return Err(ConfigError::ValidationError(format!(
            "qbittorrent app_path must start with '/', got '{}'",
            config.qbittorrent.app_path
        )));
    }

    Ok(())
}
