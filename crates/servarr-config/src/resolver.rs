//! Desired-state resolver
//!
//! Merges the declared configuration with secret values into a fully-resolved
//! target state: absolute paths, complete service URLs, and concrete
//! credentials. The resolved value is constructed once per run and treated as
//! read-only thereafter.

use crate::{
    Config, ConfigError, InstanceKind, LibraryConfig, MediaManagement, QbittorrentPreferences,
    Result, SecretStore,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Secret names required regardless of the instance set
const USERNAME_SECRET: &str = "ULTRA_USERNAME";
const SERVERNAME_SECRET: &str = "ULTRA_SERVERNAME";
const QBIT_USER_SECRET: &str = "QBIT_USER";
const QBIT_PASS_SECRET: &str = "QBIT_PASS";

/// Fully-resolved configuration for one run
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Base URL all services are served under
    pub base_url: String,

    /// Hostname part of the base URL (used for download-client registration)
    pub host: String,

    /// Absolute home directory all relative paths resolve against
    pub home_dir: String,

    /// Resolved torrent client target state
    pub qbittorrent: ResolvedQbittorrent,

    /// Resolved instances, keyed by instance name
    pub instances: BTreeMap<String, ResolvedInstance>,

    /// Media management settings shared by the Arr instances
    pub media_management: MediaManagement,

    /// Tags to create, keyed by instance name
    pub tags: BTreeMap<String, Vec<String>>,
}

/// Resolved torrent client target state
#[derive(Debug, Clone)]
pub struct ResolvedQbittorrent {
    /// Full management URL
    pub url: String,

    /// URL path under the shared host
    pub app_path: String,

    /// Login username
    pub username: String,

    /// Login password
    pub password: String,

    /// Absolute default save path
    pub default_save_path: String,

    /// Preferences to enforce
    pub preferences: QbittorrentPreferences,

    /// Categories to create, name to absolute save path
    pub categories: BTreeMap<String, String>,
}

/// One fully-resolved service instance
#[derive(Debug, Clone)]
pub struct ResolvedInstance {
    /// Instance name (`sonarr`, `radarr2`, ...)
    pub name: String,

    /// Instance kind
    pub kind: InstanceKind,

    /// Full management URL
    pub url: String,

    /// URL path under the shared host
    pub app_path: String,

    /// Resolved API key
    pub api_key: String,

    /// Absolute root folder, for Arr instances
    pub root_folder: Option<String>,

    /// Download category the instance uses
    pub category: Option<String>,

    /// Libraries to create, for the media server
    pub libraries: Vec<LibraryConfig>,
}

/// Resolve the declared configuration against a secret store.
///
/// Fails fast on any missing secret: a run must never start with a
/// partially-resolved desired state.
pub fn resolve(config: &Config, secrets: &dyn SecretStore) -> Result<ResolvedConfig> {
    let username = require_secret(secrets, USERNAME_SECRET)?;
    let servername = require_secret(secrets, SERVERNAME_SECRET)?;

    let host = format!("{}.{}.usbx.me", username, servername);
    let base_url = format!("https://{}", host);
    let home_dir = format!("/home/{}", username);

    let qbit = &config.qbittorrent;
    let qbittorrent = ResolvedQbittorrent {
        url: format!("{}{}", base_url, qbit.app_path),
        app_path: qbit.app_path.clone(),
        username: require_secret(secrets, QBIT_USER_SECRET)?,
        password: require_secret(secrets, QBIT_PASS_SECRET)?,
        default_save_path: absolute(&home_dir, &qbit.default_save_path),
        preferences: qbit.preferences.clone(),
        categories: qbit
            .categories
            .iter()
            .map(|(name, cat)| {
                let relative = cat.save_path.as_deref().unwrap_or(name.as_str());
                (name.clone(), absolute(&home_dir, relative))
            })
            .collect(),
    };

    let mut instances = BTreeMap::new();
    for (name, inst) in &config.instances {
        let api_key = require_secret(secrets, &inst.api_key_secret)?;
        debug!(instance = %name, "resolved instance credentials");

        instances.insert(
            name.clone(),
            ResolvedInstance {
                name: name.clone(),
                kind: inst.kind,
                url: format!("{}{}", base_url, inst.app_path),
                app_path: inst.app_path.clone(),
                api_key,
                root_folder: inst.root_folder.as_deref().map(|p| absolute(&home_dir, p)),
                category: inst.category.clone(),
                libraries: inst.libraries.clone(),
            },
        );
    }

    Ok(ResolvedConfig {
        base_url,
        host,
        home_dir,
        qbittorrent,
        instances,
        media_management: config.media_management.clone(),
        tags: config.tags.clone(),
    })
}

impl ResolvedConfig {
    /// Instances of a given kind, in name order
    pub fn instances_of(&self, kind: InstanceKind) -> impl Iterator<Item = &ResolvedInstance> {
        self.instances.values().filter(move |i| i.kind == kind)
    }
}

fn require_secret(secrets: &dyn SecretStore, name: &str) -> Result<String> {
    secrets
        .get(name)
        .ok_or_else(|| ConfigError::SecretNotFound(name.to_string()))
}

fn absolute(home_dir: &str, relative: &str) -> String {
    if relative.starts_with('/') {
        relative.to_string()
    } else {
        format!("{}/{}", home_dir, relative)
    }
}
