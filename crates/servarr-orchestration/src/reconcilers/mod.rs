//! Per-role reconcilers
//!
//! Each reconciler compares one service's live state against the resolved
//! desired state and applies only the differing pieces, reporting every
//! applied change as a human-readable line. All of them are idempotent: a
//! second run against converged state performs reads only.

use servarr_config::{ResolvedConfig, ResolvedInstance};
use servarr_transport::{ApiKeyAuth, RetryPolicy, ServiceClient};

use crate::{Error, Result, role::ServiceId};

mod arr;
mod facet;
mod jellyfin;
mod jellyseerr;
mod prowlarr;
mod qbittorrent;

/// Reconcile one service against its desired state, returning the list of
/// applied changes
pub(crate) async fn reconcile(
    id: ServiceId,
    config: &ResolvedConfig,
    client: &ServiceClient,
) -> Result<Vec<String>> {
    match id {
        ServiceId::Qbittorrent => qbittorrent::reconcile(config, client).await,
        ServiceId::Sonarr | ServiceId::Sonarr4k | ServiceId::Radarr | ServiceId::Radarr4k => {
            arr::reconcile(config, required_instance(config, id)?, client).await
        }
        ServiceId::Prowlarr => {
            prowlarr::reconcile(config, required_instance(config, id)?, client).await
        }
        ServiceId::Jellyfin => {
            jellyfin::reconcile(config, required_instance(config, id)?, client).await
        }
        ServiceId::Jellyseerr => jellyseerr::reconcile(config, client).await,
    }
}

pub(crate) fn required_instance(
    config: &ResolvedConfig,
    id: ServiceId,
) -> Result<&ResolvedInstance> {
    config
        .instances
        .get(id.as_str())
        .ok_or_else(|| Error::NotConfigured(id.as_str().to_string()))
}

/// Human-facing name for an instance when registering it inside another
/// service
pub(crate) fn display_name(name: &str) -> String {
    match ServiceId::parse(name) {
        Some(id) => id.display_name().to_string(),
        None => name.to_string(),
    }
}

/// Status endpoint shared by the Sonarr/Radarr family
pub(crate) fn arr_status_endpoint() -> &'static str {
    "api/v3/system/status"
}

/// Key-authenticated client for a side call to another instance
pub(crate) fn arr_client(
    instance: &ResolvedInstance,
    retry: RetryPolicy,
) -> Result<ServiceClient> {
    let client = ServiceClient::new(
        instance.url.clone(),
        Box::new(ApiKeyAuth::new(instance.api_key.clone())),
    )?;
    Ok(client.retry_policy(retry))
}

/// Check that another instance answers its status endpoint before wiring a
/// reference to it
pub(crate) async fn probe_instance(
    instance: &ResolvedInstance,
    endpoint: &str,
    retry: RetryPolicy,
) -> Result<()> {
    let client = arr_client(instance, retry)?;
    client.get(endpoint).await?;
    Ok(())
}
