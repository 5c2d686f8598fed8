//! `apply`: reconcile the stack against the declared configuration

use anyhow::{Result, bail};
use servarr_orchestration::{Orchestrator, Selector};
use std::path::Path;

pub async fn run(config_path: &Path, services: &str, dry_run: bool) -> Result<i32> {
    let config = super::load_config(config_path)?;

    let selector = Selector::parse(services);
    if selector.is_empty() {
        bail!("no known services in selector '{}'", services);
    }

    if dry_run {
        println!("Dry-run: mutations will be logged, not applied");
    }

    let report = Orchestrator::new(&config)
        .dry_run(dry_run)
        .run(&selector)
        .await?;

    print!("{}", report.render());
    Ok(report.exit_code())
}
