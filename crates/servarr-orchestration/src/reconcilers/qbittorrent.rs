//! Torrent client reconciliation: global preferences and download categories

use serde_json::{Map, Value, json};
use servarr_config::ResolvedConfig;
use servarr_transport::ServiceClient;
use tracing::debug;

use crate::Result;

pub(crate) async fn reconcile(
    config: &ResolvedConfig,
    client: &ServiceClient,
) -> Result<Vec<String>> {
    let mut changes = Vec::new();
    sync_preferences(config, client, &mut changes).await?;
    sync_categories(config, client, &mut changes).await?;
    Ok(changes)
}

/// Compare declared preferences against the live ones and push only the
/// differing keys
async fn sync_preferences(
    config: &ResolvedConfig,
    client: &ServiceClient,
    changes: &mut Vec<String>,
) -> Result<()> {
    let current = client.get("api/v2/app/preferences").await?;
    let qbit = &config.qbittorrent;
    let mut updates = Map::new();

    if current.get("save_path").and_then(Value::as_str) != Some(qbit.default_save_path.as_str()) {
        updates.insert("save_path".to_string(), json!(qbit.default_save_path));
        changes.push(format!("Set default save path: {}", qbit.default_save_path));
    }

    let prefs = &qbit.preferences;
    if let Some(mode) = &prefs.torrent_management_mode {
        // The API models the mode as a boolean auto-TMM flag
        stage_update(
            &current,
            &mut updates,
            changes,
            "auto_tmm_enabled",
            json!(mode == "automatic"),
        );
    }
    if let Some(layout) = &prefs.torrent_content_layout {
        stage_update(
            &current,
            &mut updates,
            changes,
            "torrent_content_layout",
            json!(layout),
        );
    }
    if let Some(enabled) = prefs.relocate_on_category_change {
        stage_update(
            &current,
            &mut updates,
            changes,
            "torrent_changed_tmm_enabled",
            json!(enabled),
        );
    }
    if let Some(enabled) = prefs.relocate_on_default_save_path_change {
        stage_update(
            &current,
            &mut updates,
            changes,
            "save_path_changed_tmm_enabled",
            json!(enabled),
        );
    }

    if updates.is_empty() {
        debug!("qbittorrent: all preferences already correct");
        return Ok(());
    }

    // The endpoint takes the updates as a JSON document inside a form field
    let document = Value::Object(updates).to_string();
    client
        .post_form("api/v2/app/setPreferences", &[("json", document)])
        .await?;
    Ok(())
}

fn stage_update(
    current: &Value,
    updates: &mut Map<String, Value>,
    changes: &mut Vec<String>,
    key: &str,
    desired: Value,
) {
    if current.get(key) != Some(&desired) {
        changes.push(format!("Set {}: {}", key, desired));
        updates.insert(key.to_string(), desired);
    }
}

/// Ensure every declared category exists with the right save path
async fn sync_categories(
    config: &ResolvedConfig,
    client: &ServiceClient,
    changes: &mut Vec<String>,
) -> Result<()> {
    let current = client.get("api/v2/torrents/categories").await?;

    for (name, desired_path) in &config.qbittorrent.categories {
        match current.get(name) {
            None => {
                client
                    .post_form(
                        "api/v2/torrents/createCategory",
                        &[("category", name.clone()), ("savePath", desired_path.clone())],
                    )
                    .await?;
                changes.push(format!("Created category: {} (path: {})", name, desired_path));
            }
            Some(existing)
                if existing.get("savePath").and_then(Value::as_str)
                    != Some(desired_path.as_str()) =>
            {
                client
                    .post_form(
                        "api/v2/torrents/editCategory",
                        &[("category", name.clone()), ("savePath", desired_path.clone())],
                    )
                    .await?;
                changes.push(format!("Updated category {} path: {}", name, desired_path));
            }
            Some(_) => debug!("qbittorrent: category {} already correct", name),
        }
    }

    Ok(())
}
