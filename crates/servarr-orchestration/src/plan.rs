//! Execution plan construction
//!
//! Layers the selected service instances into stages by declared dependency:
//! an instance lands in a strictly later stage than everything it depends on.
//! Failure of a dependency never removes a dependent from the plan; the
//! dependent is still attempted and converges as far as it can.

use servarr_config::ResolvedConfig;

use crate::role::{Selector, ServiceId};
use crate::{Error, Result};

/// One planned reconciliation target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    /// Which service this is
    pub id: ServiceId,
    /// Declared dependencies that are part of this plan
    pub depends_on: Vec<ServiceId>,
}

/// Ordered sequence of stages; each stage is a set of instances that may be
/// attempted once all prior stages are terminal
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    stages: Vec<Vec<ServiceInstance>>,
}

impl ExecutionPlan {
    /// Build the plan for the configured services matching the selector.
    ///
    /// Every selected, configured service appears exactly once. Dependencies
    /// outside the selection do not constrain staging, which lets selective
    /// re-runs start immediately.
    pub fn build(config: &ResolvedConfig, selector: &Selector) -> Result<Self> {
        let included: Vec<ServiceId> = ServiceId::ALL
            .into_iter()
            .filter(|id| is_configured(config, *id))
            .filter(|id| selector.contains(*id))
            .collect();

        let mut placed: Vec<ServiceId> = Vec::new();
        let mut remaining = included.clone();
        let mut stages = Vec::new();

        while !remaining.is_empty() {
            let (ready, blocked): (Vec<ServiceId>, Vec<ServiceId>) =
                remaining.into_iter().partition(|id| {
                    id.dependencies()
                        .iter()
                        .filter(|dep| included.contains(dep))
                        .all(|dep| placed.contains(dep))
                });

            if ready.is_empty() {
                // Cannot happen with the static role relationships, but a
                // stuck layering pass must never loop forever
                let names: Vec<&str> = blocked.iter().map(|id| id.as_str()).collect();
                return Err(Error::DependencyCycle(names.join(", ")));
            }

            let stage: Vec<ServiceInstance> = ready
                .iter()
                .map(|id| ServiceInstance {
                    id: *id,
                    depends_on: id
                        .dependencies()
                        .iter()
                        .copied()
                        .filter(|dep| included.contains(dep))
                        .collect(),
                })
                .collect();

            placed.extend(ready);
            stages.push(stage);
            remaining = blocked;
        }

        Ok(Self { stages })
    }

    /// The plan's stages, in execution order
    pub fn stages(&self) -> &[Vec<ServiceInstance>] {
        &self.stages
    }

    /// All planned instances, in execution order
    pub fn instances(&self) -> impl Iterator<Item = &ServiceInstance> {
        self.stages.iter().flatten()
    }

    /// Number of planned instances
    pub fn len(&self) -> usize {
        self.stages.iter().map(Vec::len).sum()
    }

    /// Whether the plan is empty
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

fn is_configured(config: &ResolvedConfig, id: ServiceId) -> bool {
    match id {
        ServiceId::Qbittorrent => true,
        other => config.instances.contains_key(other.as_str()),
    }
}
