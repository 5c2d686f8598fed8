//! Indexer aggregator reconciliation: one application entry per indexer
//! instance, plus an index sync once anything changed.

use serde_json::{Value, json};
use servarr_config::{InstanceKind, ResolvedConfig, ResolvedInstance};
use servarr_transport::ServiceClient;
use tracing::debug;

use super::facet::{as_array, field_map, fields_array, fields_drifted};
use super::{arr_status_endpoint, display_name, probe_instance};
use crate::Result;

pub(crate) async fn reconcile(
    config: &ResolvedConfig,
    instance: &ResolvedInstance,
    client: &ServiceClient,
) -> Result<Vec<String>> {
    let mut changes = Vec::new();
    let existing = client.get("api/v1/applications").await?;
    let mut mutated = false;

    let targets = config
        .instances
        .values()
        .filter(|i| matches!(i.kind, InstanceKind::Sonarr | InstanceKind::Radarr));

    for target in targets {
        // A target that is not up yet is a forward reference, not a failure;
        // it gets registered on a later run.
        if probe_instance(target, arr_status_endpoint(), client.retry())
            .await
            .is_err()
        {
            changes.push(format!(
                "Left application for {} unresolved: target unreachable",
                target.name
            ));
            continue;
        }

        let (implementation, contract) = match target.kind {
            InstanceKind::Sonarr => ("Sonarr", "SonarrSettings"),
            _ => ("Radarr", "RadarrSettings"),
        };
        let name = display_name(&target.name);
        let expected: Vec<(&str, Value)> = vec![
            ("baseUrl", json!(target.url)),
            ("apiKey", json!(target.api_key)),
            ("prowlarrUrl", json!(instance.url)),
        ];

        let found = as_array(&existing).iter().find(|app| {
            field_map(app).get("baseUrl").copied() == Some(&json!(target.url))
        });

        match found {
            None => {
                client
                    .post_json(
                        "api/v1/applications",
                        &application_payload(&name, implementation, contract, &expected),
                    )
                    .await?;
                changes.push(format!("Added Prowlarr application: {}", name));
                mutated = true;
            }
            Some(app) => {
                let current = field_map(app);
                // API keys are not returned, exclude them from the diff
                if fields_drifted(&current, &expected, &["apiKey"]) {
                    let id = app.get("id").and_then(Value::as_i64).unwrap_or_default();
                    let mut payload =
                        application_payload(&name, implementation, contract, &expected);
                    payload["id"] = json!(id);
                    client
                        .put_json(&format!("api/v1/applications/{}", id), &payload)
                        .await?;
                    changes.push(format!("Updated Prowlarr application: {}", name));
                    mutated = true;
                } else {
                    debug!("prowlarr: application already configured: {}", name);
                }
            }
        }
    }

    if mutated {
        client
            .post_json("api/v1/command", &json!({"name": "ApplicationIndexerSync"}))
            .await?;
        changes.push("Triggered ApplicationIndexerSync".to_string());
    }

    Ok(changes)
}

fn application_payload(
    name: &str,
    implementation: &str,
    contract: &str,
    expected: &[(&str, Value)],
) -> Value {
    json!({
        "name": name,
        "syncLevel": "fullSync",
        "implementation": implementation,
        "configContract": contract,
        "fields": fields_array(expected),
    })
}
