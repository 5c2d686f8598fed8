//! The closed set of service roles and the run selector

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

/// One configurable target in the stack.
///
/// The set is closed: the stack has fixed roles with fixed relationships, and
/// the identifiers double as selector tokens and step identifiers in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ServiceId {
    /// Torrent client
    #[serde(rename = "qbittorrent")]
    Qbittorrent,
    /// TV indexer, HD
    #[serde(rename = "sonarr")]
    Sonarr,
    /// TV indexer, 4K
    #[serde(rename = "sonarr2")]
    Sonarr4k,
    /// Movie indexer, HD
    #[serde(rename = "radarr")]
    Radarr,
    /// Movie indexer, 4K
    #[serde(rename = "radarr2")]
    Radarr4k,
    /// Indexer aggregator
    #[serde(rename = "prowlarr")]
    Prowlarr,
    /// Media server
    #[serde(rename = "jellyfin")]
    Jellyfin,
    /// Request manager
    #[serde(rename = "jellyseerr")]
    Jellyseerr,
}

impl ServiceId {
    /// All services, in declaration order
    pub const ALL: [ServiceId; 8] = [
        ServiceId::Qbittorrent,
        ServiceId::Sonarr,
        ServiceId::Sonarr4k,
        ServiceId::Radarr,
        ServiceId::Radarr4k,
        ServiceId::Prowlarr,
        ServiceId::Jellyfin,
        ServiceId::Jellyseerr,
    ];

    /// Stable identifier used in selectors, reports, and configuration keys
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceId::Qbittorrent => "qbittorrent",
            ServiceId::Sonarr => "sonarr",
            ServiceId::Sonarr4k => "sonarr2",
            ServiceId::Radarr => "radarr",
            ServiceId::Radarr4k => "radarr2",
            ServiceId::Prowlarr => "prowlarr",
            ServiceId::Jellyfin => "jellyfin",
            ServiceId::Jellyseerr => "jellyseerr",
        }
    }

    /// Human-facing name, used when registering one service inside another
    pub fn display_name(&self) -> &'static str {
        match self {
            ServiceId::Qbittorrent => "qBittorrent",
            ServiceId::Sonarr => "Sonarr",
            ServiceId::Sonarr4k => "Sonarr 4K",
            ServiceId::Radarr => "Radarr",
            ServiceId::Radarr4k => "Radarr 4K",
            ServiceId::Prowlarr => "Prowlarr",
            ServiceId::Jellyfin => "Jellyfin",
            ServiceId::Jellyseerr => "Jellyseerr",
        }
    }

    /// Parse a selector token
    pub fn parse(token: &str) -> Option<ServiceId> {
        ServiceId::ALL
            .into_iter()
            .find(|id| id.as_str() == token)
    }

    /// Services this one declares a dependency on.
    ///
    /// The indexers register the torrent client as their download client; the
    /// aggregator and the request manager reference the indexers.
    pub fn dependencies(&self) -> &'static [ServiceId] {
        const ARRS: [ServiceId; 4] = [
            ServiceId::Sonarr,
            ServiceId::Sonarr4k,
            ServiceId::Radarr,
            ServiceId::Radarr4k,
        ];
        match self {
            ServiceId::Qbittorrent | ServiceId::Jellyfin => &[],
            ServiceId::Sonarr | ServiceId::Sonarr4k | ServiceId::Radarr | ServiceId::Radarr4k => {
                &[ServiceId::Qbittorrent]
            }
            ServiceId::Prowlarr | ServiceId::Jellyseerr => &ARRS,
        }
    }

    /// Lightweight read used as the reachability probe. `None` for the
    /// torrent client, whose login handshake doubles as the health check.
    pub fn health_endpoint(&self) -> Option<&'static str> {
        match self {
            ServiceId::Qbittorrent => None,
            ServiceId::Sonarr | ServiceId::Sonarr4k | ServiceId::Radarr | ServiceId::Radarr4k => {
                Some("api/v3/system/status")
            }
            ServiceId::Prowlarr => Some("api/v1/system/status"),
            ServiceId::Jellyfin => Some("System/Info"),
            ServiceId::Jellyseerr => Some("api/v1/status"),
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The subset of services a run should attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector(BTreeSet<ServiceId>);

impl Selector {
    /// Select every service
    pub fn all() -> Self {
        Self(ServiceId::ALL.into_iter().collect())
    }

    /// Select an explicit set of services
    pub fn from_ids(ids: impl IntoIterator<Item = ServiceId>) -> Self {
        Self(ids.into_iter().collect())
    }

    /// Parse a comma-separated selector, `all` meaning every service.
    /// Unknown tokens are warned about and ignored.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("all") {
            return Self::all();
        }

        let mut ids = BTreeSet::new();
        for token in raw.split(',') {
            let token = token.trim().to_ascii_lowercase();
            if token.is_empty() {
                continue;
            }
            match ServiceId::parse(&token) {
                Some(id) => {
                    ids.insert(id);
                }
                None => warn!("unknown service '{}' in selector, ignoring", token),
            }
        }
        Self(ids)
    }

    /// Whether the selector includes a service
    pub fn contains(&self, id: ServiceId) -> bool {
        self.0.contains(&id)
    }

    /// Whether the selector is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
