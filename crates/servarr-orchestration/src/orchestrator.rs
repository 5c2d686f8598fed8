//! The run driver: plan, probe, reconcile, report
//!
//! Failures are isolated at the instance boundary. A failed or unreachable
//! instance is recorded and the run moves on; dependents are still attempted
//! and converge as far as their targets allow.

use servarr_config::ResolvedConfig;
use servarr_transport::{
    ApiKeyAuth, FormLoginAuth, MediaBrowserAuth, RetryPolicy, ServiceClient, TransportError,
};
use tracing::{info, warn};

use crate::plan::ExecutionPlan;
use crate::reconcilers;
use crate::report::{RunReport, StepResult, StepStatus};
use crate::role::{Selector, ServiceId};
use crate::Result;

/// Drives one reconciliation run over the configured stack
pub struct Orchestrator<'a> {
    config: &'a ResolvedConfig,
    dry_run: bool,
    retry: RetryPolicy,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator over a resolved configuration
    pub fn new(config: &'a ResolvedConfig) -> Self {
        Self {
            config,
            dry_run: false,
            retry: RetryPolicy::default(),
        }
    }

    /// Enable or disable the dry-run gate on every client
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Override the retry policy applied to every client
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run reconciliation for the selected services, in dependency order.
    ///
    /// Returns the ordered report; per-instance failures land in the report
    /// rather than in the error channel.
    pub async fn run(&self, selector: &Selector) -> Result<RunReport> {
        let plan = ExecutionPlan::build(self.config, selector)?;
        info!(
            services = plan.len(),
            stages = plan.stages().len(),
            dry_run = self.dry_run,
            "starting reconciliation run"
        );

        let mut report = RunReport::new();
        for stage in plan.stages() {
            for instance in stage {
                let step = self.reconcile_instance(instance.id).await;
                match step.status {
                    StepStatus::Ok => {
                        info!(service = %step.service, changes = step.changes.len(), "reconciled")
                    }
                    StepStatus::Failed => {
                        warn!(service = %step.service, cause = ?step.cause, "reconciliation failed")
                    }
                    StepStatus::Skipped => {
                        warn!(service = %step.service, cause = ?step.cause, "skipped")
                    }
                }
                report.push(step);
            }
        }
        Ok(report)
    }

    /// Probe reachability for the selected services without reconciling
    /// anything. Returns the probe outcome per service, in plan order.
    pub async fn check_connectivity(
        &self,
        selector: &Selector,
    ) -> Result<Vec<(ServiceId, Option<TransportError>)>> {
        let plan = ExecutionPlan::build(self.config, selector)?;
        let mut outcomes = Vec::with_capacity(plan.len());

        for instance in plan.instances() {
            let outcome = match self.client_for(instance.id) {
                Ok(client) => self.probe(instance.id, &client).await.err(),
                Err(crate::Error::Transport(e)) => Some(e),
                Err(e) => Some(TransportError::Connection(e.to_string())),
            };
            outcomes.push((instance.id, outcome));
        }
        Ok(outcomes)
    }

    async fn reconcile_instance(&self, id: ServiceId) -> StepResult {
        let client = match self.client_for(id) {
            Ok(client) => client,
            Err(e) => return StepResult::failed(id, &e),
        };

        // An instance that does not answer its probe is skipped, not failed:
        // nothing was attempted against it.
        if let Err(e) = self.probe(id, &client).await {
            return StepResult::skipped(id, format!("unreachable: {}", e));
        }

        match reconcilers::reconcile(id, self.config, &client).await {
            Ok(changes) => StepResult::ok(id, changes),
            Err(e) => StepResult::failed(id, &e),
        }
    }

    fn client_for(&self, id: ServiceId) -> Result<ServiceClient> {
        let client = match id {
            ServiceId::Qbittorrent => {
                let qbit = &self.config.qbittorrent;
                ServiceClient::new(
                    qbit.url.clone(),
                    Box::new(FormLoginAuth::new(
                        qbit.username.clone(),
                        qbit.password.clone(),
                    )),
                )?
            }
            ServiceId::Jellyfin => {
                let instance = reconcilers::required_instance(self.config, id)?;
                ServiceClient::new(
                    instance.url.clone(),
                    Box::new(MediaBrowserAuth::new(instance.api_key.clone())),
                )?
            }
            _ => {
                let instance = reconcilers::required_instance(self.config, id)?;
                ServiceClient::new(
                    instance.url.clone(),
                    Box::new(ApiKeyAuth::new(instance.api_key.clone())),
                )?
            }
        };
        Ok(client.dry_run(self.dry_run).retry_policy(self.retry))
    }

    /// Lightweight reachability check. The torrent client's login handshake
    /// doubles as its probe; everything else answers a status read.
    async fn probe(&self, id: ServiceId, client: &ServiceClient) -> servarr_transport::Result<()> {
        match id.health_endpoint() {
            None => client.login().await,
            Some(endpoint) => client.get(endpoint).await.map(|_| ()),
        }
    }
}
