//! TV and movie indexer reconciliation: root folder, download client
//! registration, media management settings, and tags.
//!
//! Sonarr and Radarr share the v3 API shape; the only divergence is the
//! category field name on the download client.

use serde_json::{Value, json};
use servarr_config::{InstanceKind, ResolvedConfig, ResolvedInstance};
use servarr_transport::ServiceClient;
use std::collections::BTreeSet;
use tracing::debug;

use super::facet::{as_array, field_map, fields_array, fields_drifted};
use crate::Result;

pub(crate) async fn reconcile(
    config: &ResolvedConfig,
    instance: &ResolvedInstance,
    client: &ServiceClient,
) -> Result<Vec<String>> {
    let mut changes = Vec::new();
    ensure_root_folder(instance, client, &mut changes).await?;
    ensure_download_client(config, instance, client, &mut changes).await?;
    sync_media_management(config, client, &mut changes).await?;
    ensure_tags(config, instance, client, &mut changes).await?;
    Ok(changes)
}

async fn ensure_root_folder(
    instance: &ResolvedInstance,
    client: &ServiceClient,
    changes: &mut Vec<String>,
) -> Result<()> {
    let Some(desired) = instance.root_folder.as_deref() else {
        return Ok(());
    };

    let folders = client.get("api/v3/rootfolder").await?;
    let exists = as_array(&folders)
        .iter()
        .any(|f| f.get("path").and_then(Value::as_str) == Some(desired));

    if exists {
        debug!("{}: root folder already exists: {}", instance.name, desired);
    } else {
        client
            .post_json("api/v3/rootfolder", &json!({"path": desired}))
            .await?;
        changes.push(format!("Added root folder: {}", desired));
    }
    Ok(())
}

async fn ensure_download_client(
    config: &ResolvedConfig,
    instance: &ResolvedInstance,
    client: &ServiceClient,
    changes: &mut Vec<String>,
) -> Result<()> {
    let clients = client.get("api/v3/downloadclient").await?;
    let qbit = &config.qbittorrent;

    let category_field = match instance.kind {
        InstanceKind::Sonarr => "tvCategory",
        _ => "movieCategory",
    };
    let expected: Vec<(&str, Value)> = vec![
        ("host", json!(config.host)),
        ("port", json!(443)),
        ("urlBase", json!(qbit.app_path)),
        ("username", json!(qbit.username)),
        ("password", json!(qbit.password)),
        (category_field, json!(instance.category.clone().unwrap_or_default())),
        ("useSsl", json!(true)),
    ];

    let existing = as_array(&clients)
        .iter()
        .find(|c| c.get("implementation").and_then(Value::as_str) == Some("QBittorrent"));

    match existing {
        None => {
            client
                .post_json("api/v3/downloadclient", &download_client_payload(&expected))
                .await?;
            changes.push("Added qBittorrent download client".to_string());
        }
        Some(entry) => {
            let current = field_map(entry);
            // The password comes back redacted, never compare it
            if fields_drifted(&current, &expected, &["password"]) {
                let id = entry.get("id").and_then(Value::as_i64).unwrap_or_default();
                let mut payload = download_client_payload(&expected);
                payload["id"] = json!(id);
                client
                    .put_json(&format!("api/v3/downloadclient/{}", id), &payload)
                    .await?;
                changes.push("Updated qBittorrent download client settings".to_string());
            } else {
                debug!("{}: download client already configured", instance.name);
            }
        }
    }
    Ok(())
}

fn download_client_payload(expected: &[(&str, Value)]) -> Value {
    json!({
        "name": "qBittorrent",
        "implementation": "QBittorrent",
        "configContract": "QBittorrentSettings",
        "enable": true,
        "protocol": "torrent",
        "fields": fields_array(expected),
    })
}

async fn sync_media_management(
    config: &ResolvedConfig,
    client: &ServiceClient,
    changes: &mut Vec<String>,
) -> Result<()> {
    let current = client.get("api/v3/config/mediamanagement").await?;
    let mm = &config.media_management;
    let mut updates = serde_json::Map::new();

    // The API flag means "copy instead of hardlinking"
    let desired_copy = json!(!mm.hardlinks);
    if current.get("hardlinksCopy") != Some(&desired_copy) {
        updates.insert("hardlinksCopy".to_string(), desired_copy);
        changes.push(format!(
            "Set hardlinks: {}",
            if mm.hardlinks { "enabled" } else { "disabled" }
        ));
    }

    let desired_analyze = json!(mm.analyze_video);
    if current.get("enableMediaInfo") != Some(&desired_analyze) {
        updates.insert("enableMediaInfo".to_string(), desired_analyze);
        changes.push(format!("Set analyze video: {}", mm.analyze_video));
    }

    let desired_propers = json!(mm.propers_and_repacks);
    if current.get("downloadPropersAndRepacks") != Some(&desired_propers) {
        updates.insert("downloadPropersAndRepacks".to_string(), desired_propers);
        changes.push(format!("Set propers/repacks: {}", mm.propers_and_repacks));
    }

    if updates.is_empty() {
        debug!("media management settings already correct");
        return Ok(());
    }

    // The endpoint expects the full settings object back
    let mut payload = current;
    if let Value::Object(map) = &mut payload {
        map.extend(updates);
    }
    client
        .put_json("api/v3/config/mediamanagement", &payload)
        .await?;
    Ok(())
}

async fn ensure_tags(
    config: &ResolvedConfig,
    instance: &ResolvedInstance,
    client: &ServiceClient,
    changes: &mut Vec<String>,
) -> Result<()> {
    let Some(desired) = config.tags.get(&instance.name) else {
        return Ok(());
    };
    if desired.is_empty() {
        return Ok(());
    }

    let existing = client.get("api/v3/tag").await?;
    let existing_labels: BTreeSet<String> = as_array(&existing)
        .iter()
        .filter_map(|t| t.get("label").and_then(Value::as_str))
        .map(|label| label.to_ascii_lowercase())
        .collect();

    for tag in desired {
        if existing_labels.contains(&tag.to_ascii_lowercase()) {
            debug!("{}: tag already exists: {}", instance.name, tag);
        } else {
            client.post_json("api/v3/tag", &json!({"label": tag})).await?;
            changes.push(format!("Created tag: {}", tag));
        }
    }
    Ok(())
}
