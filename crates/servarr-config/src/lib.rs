//! # Servarr Configuration
//!
//! YAML configuration parser and desired-state resolver for the Servarr stack.
//!
//! This crate turns the declared configuration file plus externally supplied
//! secret values into a fully-resolved, immutable [`resolver::ResolvedConfig`]:
//! service URLs assembled, home-relative paths made absolute, and every
//! `api_key_secret` reference substituted with its actual value. It performs
//! no network I/O.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub mod parser;
pub mod resolver;
pub mod secrets;

pub use resolver::{ResolvedConfig, ResolvedInstance, ResolvedQbittorrent};
pub use secrets::{EnvSecrets, SecretStore};

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// A named secret was not found in the secret store
    #[error("Secret '{0}' is not set")]
    SecretNotFound(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root configuration structure, as declared in `config.yml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Torrent client configuration
    pub qbittorrent: QbittorrentConfig,

    /// Managed service instances, keyed by instance name
    /// (`sonarr`, `sonarr2`, `radarr`, `radarr2`, `prowlarr`, `jellyfin`,
    /// `jellyseerr`)
    pub instances: BTreeMap<String, InstanceConfig>,

    /// Media management settings shared by all Arr instances
    #[serde(default)]
    pub media_management: MediaManagement,

    /// Tags to create, keyed by instance name
    #[serde(default)]
    pub tags: BTreeMap<String, Vec<String>>,
}

/// qBittorrent configuration block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QbittorrentConfig {
    /// URL path the client is served under, relative to the base URL
    #[serde(default = "default_qbit_app_path")]
    pub app_path: String,

    /// Default save path, relative to the home directory
    #[serde(default = "default_save_path")]
    pub default_save_path: String,

    /// Global preferences to enforce
    #[serde(default)]
    pub preferences: QbittorrentPreferences,

    /// Download categories to create, keyed by category name
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryConfig>,
}

/// Declared qBittorrent preferences. Absent fields are left untouched on the
/// remote side.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct QbittorrentPreferences {
    /// Torrent management mode: `automatic` or `manual`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torrent_management_mode: Option<String>,

    /// Content layout for new torrents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torrent_content_layout: Option<String>,

    /// Relocate torrents when their category changes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relocate_on_category_change: Option<bool>,

    /// Relocate torrents when the default save path changes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relocate_on_default_save_path_change: Option<bool>,
}

/// A single download category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Save path for the category, relative to the home directory.
    /// Defaults to the category name when omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_path: Option<String>,
}

/// The kind of a managed service instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceKind {
    /// TV indexer
    Sonarr,
    /// Movie indexer
    Radarr,
    /// Indexer aggregator
    Prowlarr,
    /// Media server
    Jellyfin,
    /// Request manager
    Jellyseerr,
}

/// One managed service instance, as declared
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Instance kind
    #[serde(rename = "type")]
    pub kind: InstanceKind,

    /// URL path the instance is served under, relative to the base URL
    pub app_path: String,

    /// Name of the secret holding the instance's API key
    pub api_key_secret: String,

    /// Root folder for the library, relative to the home directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_folder: Option<String>,

    /// Download category the instance should use
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Media server libraries to create (Jellyfin only)
    #[serde(default)]
    pub libraries: Vec<LibraryConfig>,
}

/// A media server library definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Display name of the library
    pub name: String,

    /// Library collection type (`tvshows`, `movies`, ...)
    pub collection_type: String,

    /// Library path, relative to the home directory
    pub path: String,
}

/// Media management settings shared by the Arr instances
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaManagement {
    /// Use hardlinks instead of copies when importing
    #[serde(default = "default_true")]
    pub hardlinks: bool,

    /// Analyze video files on import
    #[serde(default)]
    pub analyze_video: bool,

    /// Propers and repacks handling (`doNotPrefer`, `preferAndUpgrade`, ...)
    #[serde(default = "default_propers")]
    pub propers_and_repacks: String,
}

impl Default for MediaManagement {
    fn default() -> Self {
        Self {
            hardlinks: true,
            analyze_video: false,
            propers_and_repacks: default_propers(),
        }
    }
}

fn default_qbit_app_path() -> String {
    "/qbittorrent".to_string()
}

fn default_save_path() -> String {
    "downloads/qbittorrent".to_string()
}

fn default_propers() -> String {
    "doNotPrefer".to_string()
}

fn default_true() -> bool {
    true
}
