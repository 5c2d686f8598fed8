//! Step results, run reports, and the summary renderer
//!
//! A [`RunReport`] preserves execution order and is never reordered for
//! display. Step results are immutable once recorded; a retried run produces
//! a new report.

use serde::{Deserialize, Serialize};
use servarr_transport::ErrorKind;
use std::fmt::Write as _;

use crate::role::ServiceId;
use crate::Error;

/// Terminal status of one reconciliation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Every differing facet was applied (or gated by dry-run)
    Ok,
    /// A mutating call exhausted its retries
    Failed,
    /// The reachability probe failed; nothing was attempted
    Skipped,
}

/// Outcome of reconciling one service instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// Which service this step reconciled
    pub service: ServiceId,
    /// Terminal status
    pub status: StepStatus,
    /// Human-readable descriptions of the changes applied (and of facets
    /// deliberately left unresolved)
    pub changes: Vec<String>,
    /// Failure or skip cause, for FAILED and SKIPPED steps
    pub cause: Option<String>,
    /// Structured diagnostic: the underlying transport failure class
    pub error_kind: Option<ErrorKind>,
}

impl StepResult {
    /// A successful step with its applied changes
    pub fn ok(service: ServiceId, changes: Vec<String>) -> Self {
        Self {
            service,
            status: StepStatus::Ok,
            changes,
            cause: None,
            error_kind: None,
        }
    }

    /// A failed step, carrying the error's message and failure class
    pub fn failed(service: ServiceId, error: &Error) -> Self {
        let error_kind = match error {
            Error::Transport(e) => Some(e.kind()),
            _ => None,
        };
        Self {
            service,
            status: StepStatus::Failed,
            changes: Vec::new(),
            cause: Some(error.to_string()),
            error_kind,
        }
    }

    /// A skipped step with its reason
    pub fn skipped(service: ServiceId, reason: impl Into<String>) -> Self {
        Self {
            service,
            status: StepStatus::Skipped,
            changes: Vec::new(),
            cause: Some(reason.into()),
            error_kind: None,
        }
    }
}

/// Counts of steps by terminal status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Steps that ended OK
    pub succeeded: usize,
    /// Steps that ended FAILED
    pub failed: usize,
    /// Steps that ended SKIPPED
    pub skipped: usize,
}

/// Ordered record of one run's step results plus derived aggregates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    steps: Vec<StepResult>,
}

impl RunReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step result. Called exactly once per planned instance.
    pub fn push(&mut self, step: StepResult) {
        self.steps.push(step);
    }

    /// Step results in execution order
    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    /// The step for a given service, if it was attempted
    pub fn step(&self, service: ServiceId) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.service == service)
    }

    /// Counts by terminal status
    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for step in &self.steps {
            match step.status {
                StepStatus::Ok => counts.succeeded += 1,
                StepStatus::Failed => counts.failed += 1,
                StepStatus::Skipped => counts.skipped += 1,
            }
        }
        counts
    }

    /// Services eligible for a retry run (failed and skipped), in execution
    /// order
    pub fn retry_services(&self) -> Vec<ServiceId> {
        self.steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Failed | StepStatus::Skipped))
            .map(|s| s.service)
            .collect()
    }

    /// Whether any step failed
    pub fn has_failures(&self) -> bool {
        self.steps.iter().any(|s| s.status == StepStatus::Failed)
    }

    /// Process exit status: success only without failed steps. Skipped
    /// steps are surfaced but do not fail the run.
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() { 1 } else { 0 }
    }

    /// Render the human-readable summary. The layout is stable: the
    /// `Re-run with:` line is machine-parsed for selective retries.
    pub fn render(&self) -> String {
        let mut out = String::new();

        for step in &self.steps {
            match step.status {
                StepStatus::Ok => {
                    let _ = writeln!(out, "[OK] {}", step.service);
                    for change in &step.changes {
                        let _ = writeln!(out, "        + {}", change);
                    }
                }
                StepStatus::Failed => {
                    let _ = writeln!(out, "[FAIL] {}", step.service);
                    let kind = step
                        .error_kind
                        .map(|k| k.to_string())
                        .unwrap_or_else(|| "Error".to_string());
                    let cause = step.cause.as_deref().unwrap_or("unknown");
                    let _ = writeln!(out, "        ! {}: {}", kind, cause);
                }
                StepStatus::Skipped => {
                    let _ = writeln!(out, "[SKIP] {}", step.service);
                    let cause = step.cause.as_deref().unwrap_or("unknown");
                    let _ = writeln!(out, "        + Skipped: {}", cause);
                }
            }
        }

        let counts = self.counts();
        let _ = writeln!(
            out,
            "Result: {} succeeded, {} failed, {} skipped",
            counts.succeeded, counts.failed, counts.skipped
        );

        let retry = self.retry_services();
        if !retry.is_empty() {
            let list: Vec<&str> = retry.iter().map(|id| id.as_str()).collect();
            let _ = writeln!(out, "Re-run with: --services {}", list.join(","));
        }

        out
    }
}
