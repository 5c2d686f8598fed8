//! Media server reconciliation: virtual-folder libraries

use serde_json::{Value, json};
use servarr_config::{LibraryConfig, ResolvedConfig, ResolvedInstance};
use servarr_transport::ServiceClient;
use std::collections::BTreeSet;
use tracing::debug;

use super::facet::as_array;
use crate::Result;

/// Library set used when the instance declares none
const DEFAULT_LIBRARIES: [(&str, &str, &str); 4] = [
    ("TV Shows", "tvshows", "media/all/tv"),
    ("TV Shows UHD", "tvshows", "media/all/tv-uhd"),
    ("Movies", "movies", "media/all/movies"),
    ("Movies UHD", "movies", "media/all/movies-uhd"),
];

pub(crate) async fn reconcile(
    config: &ResolvedConfig,
    instance: &ResolvedInstance,
    client: &ServiceClient,
) -> Result<Vec<String>> {
    let mut changes = Vec::new();

    let existing = client.get("Library/VirtualFolders").await?;
    let existing_names: BTreeSet<&str> = as_array(&existing)
        .iter()
        .filter_map(|lib| lib.get("Name").and_then(Value::as_str))
        .collect();

    let libraries: Vec<LibraryConfig> = if instance.libraries.is_empty() {
        DEFAULT_LIBRARIES
            .iter()
            .map(|(name, collection_type, path)| LibraryConfig {
                name: name.to_string(),
                collection_type: collection_type.to_string(),
                path: path.to_string(),
            })
            .collect()
    } else {
        instance.libraries.clone()
    };

    let mut created = false;
    for library in &libraries {
        if existing_names.contains(library.name.as_str()) {
            debug!("jellyfin: library already exists: {}", library.name);
            continue;
        }

        let path = if library.path.starts_with('/') {
            library.path.clone()
        } else {
            format!("{}/{}", config.home_dir, library.path)
        };

        // Name, collection type, and paths travel as query parameters; the
        // body carries the library options. Refresh is deferred until every
        // library exists.
        client
            .post_query_json(
                "Library/VirtualFolders",
                &[
                    ("name", library.name.clone()),
                    ("collectionType", library.collection_type.clone()),
                    ("paths", path.clone()),
                    ("refreshLibrary", "false".to_string()),
                ],
                &json!({"LibraryOptions": {}}),
            )
            .await?;
        changes.push(format!("Created library: {} ({})", library.name, path));
        created = true;
    }

    if created {
        client.post_empty("Library/Refresh").await?;
        changes.push("Triggered library refresh".to_string());
    }

    Ok(changes)
}
