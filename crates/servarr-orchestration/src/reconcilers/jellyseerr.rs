//! Request manager reconciliation: register every indexer instance as a
//! request target, with the right quality profile and default flags.
//!
//! Profile identifiers live in the target instances, so each registration
//! needs a side call to the indexer it points at. A target whose profiles
//! cannot be resolved yet is left alone and picked up on a later run.

use serde_json::{Value, json};
use servarr_config::{InstanceKind, ResolvedConfig, ResolvedInstance};
use servarr_transport::ServiceClient;
use tracing::debug;

use super::facet::as_array;
use super::{arr_client, display_name};
use crate::Result;

/// Quality profile each instance requests with, by instance name
const QUALITY_PROFILES: [(&str, &str); 4] = [
    ("sonarr", "WEB-1080p"),
    ("sonarr2", "WEB-2160p"),
    ("radarr", "HD Bluray + WEB"),
    ("radarr2", "UHD Bluray + WEB"),
];

/// Instances serving as the default non-4K targets
const DEFAULT_STANDARD: [&str; 2] = ["sonarr", "radarr"];

/// Instances serving as the default 4K targets
const DEFAULT_4K: [&str; 2] = ["sonarr2", "radarr2"];

pub(crate) async fn reconcile(
    config: &ResolvedConfig,
    client: &ServiceClient,
) -> Result<Vec<String>> {
    let mut changes = Vec::new();
    sync_servers(config, client, InstanceKind::Sonarr, &mut changes).await?;
    sync_servers(config, client, InstanceKind::Radarr, &mut changes).await?;
    Ok(changes)
}

async fn sync_servers(
    config: &ResolvedConfig,
    client: &ServiceClient,
    kind: InstanceKind,
    changes: &mut Vec<String>,
) -> Result<()> {
    let settings_path = match kind {
        InstanceKind::Sonarr => "api/v1/settings/sonarr",
        _ => "api/v1/settings/radarr",
    };
    let existing = client.get(settings_path).await?;

    for target in config.instances_of(kind) {
        let name = display_name(&target.name);

        let Some(payload) = server_payload(config, client, target, &name, changes).await? else {
            continue;
        };

        let found = as_array(&existing)
            .iter()
            .find(|server| server.get("baseUrl").and_then(Value::as_str) == Some(&target.app_path));

        match found {
            None => {
                client.post_json(settings_path, &payload).await?;
                changes.push(format!("Registered server: {}", name));
            }
            Some(server) => {
                // API keys come back redacted and ids are server-assigned
                if server_drifted(server, &payload, &["apiKey", "id"]) {
                    let id = server.get("id").and_then(Value::as_i64).unwrap_or_default();
                    client
                        .put_json(&format!("{}/{}", settings_path, id), &payload)
                        .await?;
                    changes.push(format!("Updated server: {}", name));
                } else {
                    debug!("jellyseerr: server already configured: {}", name);
                }
            }
        }
    }
    Ok(())
}

/// Build the registration payload, or `None` when the target's profiles are
/// not resolvable yet
async fn server_payload(
    config: &ResolvedConfig,
    client: &ServiceClient,
    target: &ResolvedInstance,
    name: &str,
    changes: &mut Vec<String>,
) -> Result<Option<Value>> {
    let side = arr_client(target, client.retry())?;

    let profiles = match side.get("api/v3/qualityprofile").await {
        Ok(profiles) => profiles,
        Err(_) => {
            changes.push(format!(
                "Left Jellyseerr server for {} unresolved: target unreachable",
                target.name
            ));
            return Ok(None);
        }
    };
    let Some((profile_id, profile_name)) = pick_quality_profile(&target.name, &profiles) else {
        changes.push(format!(
            "Left Jellyseerr server for {} unresolved: quality profile unavailable",
            target.name
        ));
        return Ok(None);
    };

    let is_4k = DEFAULT_4K.contains(&target.name.as_str());
    let is_default = DEFAULT_STANDARD.contains(&target.name.as_str());

    let mut payload = json!({
        "name": name,
        "hostname": config.host,
        "port": 443,
        "useSsl": true,
        "apiKey": target.api_key,
        "baseUrl": target.app_path,
        "activeProfileId": profile_id,
        "activeProfileName": profile_name,
        "activeDirectory": target.root_folder.clone().unwrap_or_default(),
        "is4k": is_4k,
        "isDefault": is_default,
    });

    match target.kind {
        InstanceKind::Sonarr => {
            payload["activeLanguageProfileId"] = json!(resolve_language_profile(&side).await);
            payload["enableSeasonFolders"] = json!(true);
        }
        _ => {
            payload["minimumAvailability"] = json!("released");
        }
    }

    Ok(Some(payload))
}

/// The preferred quality profile for an instance, falling back to the first
/// one the target offers
fn pick_quality_profile(instance_name: &str, profiles: &Value) -> Option<(i64, String)> {
    let preferred = QUALITY_PROFILES
        .iter()
        .find(|(name, _)| *name == instance_name)
        .map(|(_, profile)| *profile);

    let profiles = as_array(profiles);
    let chosen = preferred
        .and_then(|want| {
            profiles
                .iter()
                .find(|p| p.get("name").and_then(Value::as_str) == Some(want))
        })
        .or_else(|| profiles.first());

    let profile = chosen?;
    Some((
        profile.get("id").and_then(Value::as_i64)?,
        profile
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    ))
}

/// Language profile id on a TV target, preferring English. Older servers
/// without the endpoint get the conventional default of 1.
async fn resolve_language_profile(side: &ServiceClient) -> i64 {
    let Ok(profiles) = side.get("api/v3/languageprofile").await else {
        return 1;
    };
    as_array(&profiles)
        .iter()
        .find(|p| {
            p.get("name")
                .and_then(Value::as_str)
                .is_some_and(|n| n.eq_ignore_ascii_case("english"))
        })
        .or_else(|| as_array(&profiles).first())
        .and_then(|p| p.get("id").and_then(Value::as_i64))
        .unwrap_or(1)
}

/// Whether any payload key differs from the registered server's value
fn server_drifted(server: &Value, payload: &Value, skip: &[&str]) -> bool {
    let Some(desired) = payload.as_object() else {
        return false;
    };
    desired
        .iter()
        .filter(|(key, _)| !skip.contains(&key.as_str()))
        .any(|(key, want)| server.get(key) != Some(want))
}
