//! # Servarr Orchestration
//!
//! Dependency-ordered reconciliation of the Servarr stack.
//!
//! The [`Orchestrator`] builds an [`ExecutionPlan`] over the configured
//! service instances, reconciles each one against its desired state through
//! the per-role reconcilers, isolates failures at the instance boundary, and
//! aggregates the outcomes into a [`RunReport`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use servarr_orchestration::{Orchestrator, Selector};
//!
//! # async fn example(config: servarr_config::ResolvedConfig) -> servarr_orchestration::Result<()> {
//! let report = Orchestrator::new(&config)
//!     .dry_run(true)
//!     .run(&Selector::all())
//!     .await?;
//! println!("{}", report.render());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod orchestrator;
mod plan;
mod reconcilers;
mod report;
mod role;

pub use orchestrator::Orchestrator;
pub use plan::{ExecutionPlan, ServiceInstance};
pub use report::{RunReport, StatusCounts, StepResult, StepStatus};
pub use role::{Selector, ServiceId};

use servarr_transport::TransportError;

/// Error types for orchestration operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A mutating call exhausted its retries or the transport failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The declared dependencies cannot be ordered
    #[error("dependency cycle involving: {0}")]
    DependencyCycle(String),

    /// A planned service has no configuration entry
    #[error("service '{0}' is not configured")]
    NotConfigured(String),
}

/// Result type for orchestration operations
pub type Result<T> = std::result::Result<T, Error>;
